//! Integration tests for the Kabinet control plane

mod common;
mod test_dispatch;
mod test_fsm;
mod test_selection;
mod test_server;
mod test_store;
