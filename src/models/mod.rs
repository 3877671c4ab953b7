pub mod server_model;
