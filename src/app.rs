//! Application hooks

/// The application that sits on top of the stack
///
/// The stack owns the sockets, such as they are; the application only sees payloads.
pub trait Application {
    /// Handles a request received by the HTTP listener
    ///
    /// Returns the response, if any. It's sent in a single segment that also closes the
    /// connection.
    fn http_request(&mut self, request: &[u8]) -> Option<&[u8]>;

    /// Returns the request the HTTP client sends once its connection is established
    fn http_client_request(&mut self) -> &[u8];

    /// Handles response bytes received by the HTTP client
    fn http_response(&mut self, response: &[u8]);

    /// Returns the reply to a datagram received on any UDP port other than DHCP's
    ///
    /// By default `Invoke.` commands are greeted and everything else is refused.
    fn udp_command(&mut self, payload: &[u8]) -> Option<&[u8]> {
        let reply: &'static [u8] = if payload.starts_with(b"Invoke.") {
            b"Hello World\0"
        } else {
            b"Access Denied.\0"
        };

        Some(reply)
    }
}
