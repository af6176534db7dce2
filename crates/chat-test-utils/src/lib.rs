// chat-test-utils: shared test utilities for the chat server suites.
//
// Provides a typed WebSocket client for integration testing of the realtime
// endpoint.

pub mod mock_ws_client;

pub use mock_ws_client::MockWsClient;
