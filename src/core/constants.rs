//! Protocol constants for the SMB2/SMB3 wire layer.
//!
//! These values are fixed by MS-SMB2 and MUST NOT be changed.

// =============================================================================
// SMB2 MESSAGE HEADER
// =============================================================================

/// Fixed SMB2 header length.
pub const SMB2_HEADER_LENGTH: usize = 64;

/// SMB2 protocol marker (`0xFE 'S' 'M' 'B'`).
pub const SMB2_PROTOCOL_ID: [u8; 4] = [0xFE, b'S', b'M', b'B'];

/// Offset of the signature field within the header.
pub const SIGNATURE_OFFSET: usize = 48;

/// Length of the header signature field.
pub const SIGNATURE_LENGTH: usize = 16;

/// Offset of the flags field within the header.
pub const FLAGS_OFFSET: usize = 16;

/// Offset of the next-command field within the header.
pub const NEXT_COMMAND_OFFSET: usize = 20;

/// StructureSize of an SMB2 error response body.
pub const ERROR_STRUCTURE_SIZE: u16 = 9;

// =============================================================================
// HEADER FLAGS
// =============================================================================

/// The message is a response from server to client.
pub const SMB2_FLAGS_SERVER_TO_REDIR: u32 = 0x0000_0001;

/// The command is handled asynchronously.
pub const SMB2_FLAGS_ASYNC_COMMAND: u32 = 0x0000_0002;

/// The operation is related to the previous one in a compound chain.
pub const SMB2_FLAGS_RELATED_OPERATIONS: u32 = 0x0000_0004;

/// The message is signed.
pub const SMB2_FLAGS_SIGNED: u32 = 0x0000_0008;

/// Mask for the message priority bits.
pub const SMB2_FLAGS_PRIORITY_MASK: u32 = 0x0000_0070;

/// The operation is a DFS operation.
pub const SMB2_FLAGS_DFS_OPERATIONS: u32 = 0x1000_0000;

/// The message is a replay of an earlier operation.
pub const SMB2_FLAGS_REPLAY_OPERATION: u32 = 0x2000_0000;

// =============================================================================
// NT STATUS
// =============================================================================

/// The operation completed successfully.
pub const NT_STATUS_OK: u32 = 0x0000_0000;

/// Interim response for an asynchronously handled command.
pub const NT_STATUS_PENDING: u32 = 0x0000_0103;

/// Multi-round-trip exchange in progress (e.g. session setup).
pub const NT_STATUS_MORE_PROCESSING_REQUIRED: u32 = 0xC000_0016;

// =============================================================================
// TRANSFORM HEADER (ENCRYPTION WRAPPER)
// =============================================================================

/// Fixed transform header length.
pub const TRANSFORM_HEADER_LENGTH: usize = 52;

/// SMB2 transform marker (`0xFD 'S' 'M' 'B'`).
pub const SMB2_TRANSFORM_ID: [u8; 4] = [0xFD, b'S', b'M', b'B'];

/// Transform header flag indicating the payload is encrypted (SMB 3.1.1).
pub const TRANSFORM_FLAG_ENCRYPTED: u16 = 0x0001;

/// Length of the transform header signature/tag and nonce fields.
pub const TRANSFORM_FIELD_LENGTH: usize = 16;

// =============================================================================
// AEAD SIZES
// =============================================================================

/// Authentication tag size for all SMB3 ciphers.
pub const AEAD_TAG_LENGTH: usize = 16;

/// GCM nonce size (12-byte salt + 4-byte counter).
pub const GCM_NONCE_LENGTH: usize = 16;

/// CCM nonce size (8-byte counter + 4 reserved bytes).
pub const CCM_NONCE_LENGTH: usize = 12;

/// Length of the fixed random salt prefix in GCM nonces.
pub const GCM_SALT_LENGTH: usize = 12;

// =============================================================================
// KEY ROTATION
// =============================================================================

/// Default number of bytes encrypted under one key generation before
/// rotation is required (1 GiB).
pub const DEFAULT_KEY_ROTATION_BYTES: u64 = 1 << 30;

/// Default key-generation age in seconds before rotation (24 hours).
pub const DEFAULT_KEY_ROTATION_SECS: u64 = 24 * 60 * 60;
