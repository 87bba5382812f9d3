pub mod flow_routes;
