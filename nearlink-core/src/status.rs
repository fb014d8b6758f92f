//! Application-observable status/exit codes (§6, §7).
//!
//! `Status` is the synchronous return value of every `ClientProxy` API call
//! and the payload of `on_connection_result`/`on_disconnected`. It is kept
//! separate from the crate's internal `CodecError`/`ValidationError` types
//! the same way `s2n-quic`'s public `connection::Error` is kept separate
//! from the wire-level `transport::Error` it is built from.

/// Application-visible outcome of an API call or lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, displaydoc::Display)]
#[non_exhaustive]
pub enum Status {
    /// ok
    Ok,
    /// an unspecified error occurred
    Error,
    /// the API was called in a state that does not allow it
    OutOfOrderApiCall,
    /// a strategy is already active for this session
    AlreadyHaveActiveStrategy,
    /// advertising is already in progress
    AlreadyAdvertising,
    /// discovery is already in progress
    AlreadyDiscovering,
    /// an I/O error occurred on the endpoint's channel
    EndpointIoError,
    /// the endpoint id is not known to this session
    EndpointUnknown,
    /// the remote peer rejected the connection request
    ConnectionRejected,
    /// already connected to this endpoint (topology or duplicate-request violation)
    AlreadyConnectedToEndpoint,
    /// not connected to this endpoint
    NotConnectedToEndpoint,
    /// a Bluetooth Classic medium error occurred
    BluetoothError,
    /// a BLE medium error occurred
    BleError,
    /// a Wi-Fi LAN medium error occurred
    WifiLanError,
    /// the payload id is not known to this session
    PayloadUnknown,
    /// the endpoint or session was reset
    Reset,
    /// the operation timed out
    Timeout,
}

impl Status {
    /// True for [`Status::Ok`], false for every failure variant.
    pub fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Ok
    }
}

/// Why an endpoint was disconnected (§4.5, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, displaydoc::Display)]
pub enum DisconnectReason {
    /// the application asked to disconnect
    LocalRequest,
    /// the peer sent a DISCONNECTION frame
    RemoteRequest,
    /// a frame read or write failed
    EndpointIoError,
    /// no keep-alive was observed within the configured timeout
    Timeout,
    /// a malformed frame or an out-of-state frame was received
    Protocol,
}

impl From<DisconnectReason> for Status {
    fn from(reason: DisconnectReason) -> Self {
        match reason {
            DisconnectReason::LocalRequest | DisconnectReason::RemoteRequest => Status::Ok,
            DisconnectReason::EndpointIoError => Status::EndpointIoError,
            DisconnectReason::Timeout => Status::Timeout,
            DisconnectReason::Protocol => Status::Error,
        }
    }
}
