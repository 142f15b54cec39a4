/// Reference id assigned by the replication transport to a structural node.
pub type RefId = u32;
pub type OperationCode = u8;
/// Numeric code carried by errors, leave events and numeric message types.
pub type StatusCode = i32;

/// Reference id of the root state node.
pub const ROOT_REF_ID: RefId = 0;

/// Close codes the transport reports for an orderly leave.
pub const CLOSE_NORMAL: StatusCode = 1000;
pub const CLOSE_CONSENTED: StatusCode = 4000;

/// Bridge-local codes. Codes coming from the remote side pass through untouched.
pub mod error_codes {
    use super::StatusCode;

    pub const INVALID_HANDLE: StatusCode = 0;
    pub const HANDLE_RELEASED: StatusCode = -1;
    pub const SEND_FAILURE: StatusCode = -2;
    pub const LISTENER_ATTACH_FAILURE: StatusCode = -3;
    pub const UNREPRESENTABLE_VALUE: StatusCode = -4;
    pub const INVALID_OPTIONS: StatusCode = -5;
}
