pub mod mingle_server;
