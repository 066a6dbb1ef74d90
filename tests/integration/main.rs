//! Integration tests: session, gateway and pipeline against an in-memory
//! backoffice.

mod mock_transport;

mod pipeline_test;
