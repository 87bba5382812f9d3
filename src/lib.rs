pub mod db;
pub mod flow;
pub mod server;
pub mod web;
pub mod version;

#[cfg(test)]
pub(crate) mod test_support;
