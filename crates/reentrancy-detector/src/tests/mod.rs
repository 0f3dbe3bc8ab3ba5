mod helpers;

mod rpc_http;
