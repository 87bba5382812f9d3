//! Integer-coded columns. Decoding is lenient: a code outside the known set maps to the
//! variant the panel treats as the fallback, so one odd row never fails a whole query.

use sea_orm::sea_query::{ArrayType, ColumnType, Nullable, ValueType, ValueTypeErr};
use sea_orm::{ColIdx, QueryResult, TryGetError, TryGetable, Value};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! integer_column {
    ($ty:ident) => {
        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::Int(Some(value.code()))
            }
        }

        impl TryGetable for $ty {
            fn try_get_by<I: ColIdx>(res: &QueryResult, index: I) -> Result<Self, TryGetError> {
                <i32 as TryGetable>::try_get_by(res, index).map($ty::from_code)
            }
        }

        impl ValueType for $ty {
            fn try_from(v: Value) -> Result<Self, ValueTypeErr> {
                <i32 as ValueType>::try_from(v).map($ty::from_code)
            }

            fn type_name() -> String {
                stringify!($ty).to_owned()
            }

            fn array_type() -> ArrayType {
                ArrayType::Int
            }

            fn column_type() -> ColumnType {
                ColumnType::Integer
            }
        }

        impl Nullable for $ty {
            fn null() -> Value {
                Value::Int(None)
            }
        }
    };
}

/// Two-valued status shared by forwards, users and user-tunnel associations.
/// Only `1` is active; any other stored code reads as paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityStatus {
    Paused,
    Active,
}

impl EntityStatus {
    pub fn code(self) -> i32 {
        match self {
            EntityStatus::Paused => 0,
            EntityStatus::Active => 1,
        }
    }

    pub fn from_code(code: i32) -> Self {
        if code == 1 {
            EntityStatus::Active
        } else {
            EntityStatus::Paused
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

integer_column!(EntityStatus);

/// Topology of a tunnel. A tunnel forward spans an ingress and an egress node.
/// Codes other than `2` read as a port forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TunnelType {
    PortForward,
    TunnelForward,
}

impl TunnelType {
    pub fn code(self) -> i32 {
        match self {
            TunnelType::PortForward => 1,
            TunnelType::TunnelForward => 2,
        }
    }

    pub fn from_code(code: i32) -> Self {
        if code == 2 {
            TunnelType::TunnelForward
        } else {
            TunnelType::PortForward
        }
    }

    pub fn is_dual_node(self) -> bool {
        matches!(self, TunnelType::TunnelForward)
    }
}

integer_column!(TunnelType);

/// Accounting convention of a tunnel. Codes other than `1` read as bidirectional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FlowMode {
    /// All measured bytes are billed as outbound.
    SingleDirection,
    #[default]
    Bidirectional,
}

impl FlowMode {
    pub fn code(self) -> i32 {
        match self {
            FlowMode::SingleDirection => 1,
            FlowMode::Bidirectional => 2,
        }
    }

    pub fn from_code(code: i32) -> Self {
        if code == 1 {
            FlowMode::SingleDirection
        } else {
            FlowMode::Bidirectional
        }
    }
}

integer_column!(FlowMode);
