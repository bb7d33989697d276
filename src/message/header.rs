//! SMB2 message header codec with compound chaining.
//!
//! A [`Message`] is one SMB2 protocol message: the fixed 64-byte header plus
//! a command body delegated to a [`MessageBody`] serializer. Messages can be
//! chained for compound sends; chained links are encoded back to back at
//! 8-byte-aligned offsets with the next-command field of each non-final link
//! backfilled.
//!
//! Wire format of the fixed header:
//! ```text
//! +------------+----------------+---------------+----------------+
//! | ProtocolId | StructureSize  | CreditCharge  | Status         |
//! | 4 bytes    | 2 bytes (64)   | 2 bytes       | 4 bytes        |
//! +------------+----------------+---------------+----------------+
//! | Command    | CreditReq/Grant| Flags         | NextCommand    |
//! | 2 bytes    | 2 bytes        | 4 bytes       | 4 bytes        |
//! +------------+----------------+---------------+----------------+
//! | MessageId  | Reserved+TreeId (sync) or AsyncId (async)       |
//! | 8 bytes    | 8 bytes                                         |
//! +------------+-------------------------------------------------+
//! | SessionId  | Signature                                       |
//! | 8 bytes    | 16 bytes                                        |
//! +------------+-------------------------------------------------+
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::core::constants::{
    ERROR_STRUCTURE_SIZE, NT_STATUS_MORE_PROCESSING_REQUIRED, NT_STATUS_PENDING,
    SIGNATURE_LENGTH, SIGNATURE_OFFSET, SMB2_FLAGS_ASYNC_COMMAND, SMB2_FLAGS_RELATED_OPERATIONS,
    SMB2_HEADER_LENGTH, SMB2_PROTOCOL_ID,
};
use crate::core::error::DecodeError;
use crate::core::traits::{MessageBody, SigningDigest};
use crate::core::wire::{get_u16, get_u32, get_u64, put_u16, put_u32, put_u64};

use super::command::Command;
use super::flags::HeaderFlags;

/// Round `size` up to the next 8-byte boundary.
pub fn size8(size: usize) -> usize {
    (size + 7) & !7
}

/// Padding needed to realign `index` to an 8-byte boundary relative to
/// `header_start`.
fn pad8(header_start: usize, index: usize) -> usize {
    let rem = (index - header_start) % 8;
    if rem == 0 { 0 } else { 8 - rem }
}

/// A body serializer that carries no bytes at all.
pub struct EmptyBody;

impl MessageBody for EmptyBody {
    fn write_body(&self, _dst: &mut [u8], _offset: usize) -> usize {
        0
    }

    fn read_body(&mut self, _src: &[u8], _offset: usize) -> Result<usize, DecodeError> {
        Ok(0)
    }
}

/// A body serializer over raw bytes.
///
/// On encode, writes its bytes verbatim. On decode, consumes exactly the
/// capacity it was constructed with; use [`RawBody::reader`] when the body
/// length is known from the surrounding protocol exchange.
pub struct RawBody {
    bytes: Vec<u8>,
}

impl RawBody {
    /// Body that writes the given bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Body that reads exactly `len` bytes on decode.
    pub fn reader(len: usize) -> Self {
        Self { bytes: vec![0; len] }
    }

    /// The body bytes (written or read).
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl MessageBody for RawBody {
    fn write_body(&self, dst: &mut [u8], offset: usize) -> usize {
        dst[offset..offset + self.bytes.len()].copy_from_slice(&self.bytes);
        self.bytes.len()
    }

    fn read_body(&mut self, src: &[u8], offset: usize) -> Result<usize, DecodeError> {
        let len = self.bytes.len();
        if src.len() < offset + len {
            return Err(DecodeError::BufferTooShort {
                needed: offset + len,
                available: src.len(),
            });
        }
        self.bytes.copy_from_slice(&src[offset..offset + len]);
        Ok(len)
    }
}

/// One SMB2 message: fixed header, delegated body, optional compound chain.
///
/// Created per request or response, encoded or decoded once, then discarded.
/// Equality and hashing are keyed solely on the message id.
pub struct Message {
    command: Command,
    flags: HeaderFlags,
    status: u32,
    credit_charge: u16,
    credit: u16,
    mid: u64,
    async_id: u64,
    tree_id: u32,
    session_id: u64,
    signature: [u8; SIGNATURE_LENGTH],
    header_start: usize,
    length: usize,
    next_command: u32,
    read_size: usize,
    error_context_count: u8,
    error_data: Option<Vec<u8>>,
    retain_payload: bool,
    raw_payload: Option<Vec<u8>>,
    require_secure_negotiate: bool,
    digest: Option<Arc<dyn SigningDigest>>,
    body: Box<dyn MessageBody>,
    next: Option<Box<Message>>,
}

impl Message {
    /// Create a message for `command` with the given body serializer.
    pub fn new(command: Command, body: Box<dyn MessageBody>) -> Self {
        Self {
            command,
            flags: HeaderFlags::NONE,
            status: 0,
            credit_charge: 0,
            credit: 0,
            mid: 0,
            async_id: 0,
            tree_id: 0,
            session_id: 0,
            signature: [0; SIGNATURE_LENGTH],
            header_start: 0,
            length: 0,
            next_command: 0,
            read_size: 0,
            error_context_count: 0,
            error_data: None,
            retain_payload: false,
            raw_payload: None,
            require_secure_negotiate: false,
            digest: None,
            body,
            next: None,
        }
    }

    /// The command of this message.
    pub fn command(&self) -> Command {
        self.command
    }

    /// The header flags.
    pub fn flags(&self) -> HeaderFlags {
        self.flags
    }

    /// Set the given flag bits.
    pub fn add_flags(&mut self, bits: u32) {
        self.flags.insert(bits);
    }

    /// Clear the given flag bits.
    pub fn clear_flags(&mut self, bits: u32) {
        self.flags.remove(bits);
    }

    /// The NT status of this message.
    pub fn status(&self) -> u32 {
        self.status
    }

    /// The message id.
    pub fn mid(&self) -> u64 {
        self.mid
    }

    /// Set the message id.
    pub fn set_mid(&mut self, mid: u64) {
        self.mid = mid;
    }

    /// The granted (response) or requested (request) credit count.
    pub fn credit(&self) -> u16 {
        self.credit
    }

    /// Set the credit count.
    pub fn set_credit(&mut self, credit: u16) {
        self.credit = credit;
    }

    /// The credit charge.
    pub fn credit_charge(&self) -> u16 {
        self.credit_charge
    }

    /// Set the credit charge.
    pub fn set_credit_charge(&mut self, charge: u16) {
        self.credit_charge = charge;
    }

    /// The session id.
    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    /// Set the session id, mirroring it onto every chained message.
    pub fn set_session_id(&mut self, session_id: u64) {
        self.session_id = session_id;
        if let Some(next) = &mut self.next {
            next.set_session_id(session_id);
        }
    }

    /// The tree id (sync addressing only).
    pub fn tree_id(&self) -> u32 {
        self.tree_id
    }

    /// Set the tree id, mirroring it onto every chained message.
    pub fn set_tree_id(&mut self, tree_id: u32) {
        self.tree_id = tree_id;
        if let Some(next) = &mut self.next {
            next.set_tree_id(tree_id);
        }
    }

    /// The async id (async addressing only).
    pub fn async_id(&self) -> u64 {
        self.async_id
    }

    /// Set the async id and switch the message to async addressing.
    pub fn set_async_id(&mut self, async_id: u64) {
        self.async_id = async_id;
        self.flags.insert(SMB2_FLAGS_ASYNC_COMMAND);
    }

    /// Whether this message uses async addressing.
    pub fn is_async(&self) -> bool {
        self.flags.is_async()
    }

    /// Attach a signing digest, propagating it onto every chained message.
    pub fn set_digest(&mut self, digest: Arc<dyn SigningDigest>) {
        if let Some(next) = &mut self.next {
            next.set_digest(Arc::clone(&digest));
        }
        self.digest = Some(digest);
    }

    /// The attached signing digest, if any.
    pub fn digest(&self) -> Option<&Arc<dyn SigningDigest>> {
        self.digest.as_ref()
    }

    /// Require signature verification even on error responses.
    ///
    /// The default skips verification on error responses; transports that
    /// negotiated mandatory secure-negotiate must turn this on.
    pub fn set_require_secure_negotiate(&mut self, require: bool) {
        self.require_secure_negotiate = require;
    }

    /// Keep a copy of the exact encoded/decoded byte range.
    pub fn retain_payload(&mut self) {
        self.retain_payload = true;
    }

    /// Whether payload retention was requested.
    pub fn is_retain_payload(&self) -> bool {
        self.retain_payload
    }

    /// The retained payload, if any.
    pub fn raw_payload(&self) -> Option<&[u8]> {
        self.raw_payload.as_deref()
    }

    /// Declared size of the receive this message arrived in; the final link
    /// of a compound decode consumes the remainder of it.
    pub fn set_read_size(&mut self, read_size: usize) {
        self.read_size = read_size;
    }

    /// Offset from this header to the next compound command (0 = final).
    pub fn next_command_offset(&self) -> u32 {
        self.next_command
    }

    /// Byte offset at which this message's header started.
    pub fn header_start(&self) -> usize {
        self.header_start
    }

    /// Encoded or decoded length of this message, excluding chained links.
    pub fn length(&self) -> usize {
        self.length
    }

    /// The error context count of a decoded error response.
    pub fn error_context_count(&self) -> u8 {
        self.error_context_count
    }

    /// Opaque error data of a decoded error response, if any.
    pub fn error_data(&self) -> Option<&[u8]> {
        self.error_data.as_deref()
    }

    /// The signature bytes read from a decoded header.
    pub fn signature(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.signature
    }

    /// Append `n` to the end of this message's compound chain.
    ///
    /// Marks the new link as a related operation and hands it the head's
    /// digest so every link gets signed.
    pub fn chain(&mut self, mut n: Message) {
        if let Some(next) = &mut self.next {
            next.chain(n);
            return;
        }
        n.flags.insert(SMB2_FLAGS_RELATED_OPERATIONS);
        if n.digest.is_none() {
            n.digest = self.digest.clone();
        }
        self.next = Some(Box::new(n));
    }

    /// The next message in the compound chain, if any.
    pub fn next(&self) -> Option<&Message> {
        self.next.as_deref()
    }

    /// Mutable access to the next message in the compound chain.
    pub fn next_mut(&mut self) -> Option<&mut Message> {
        self.next.as_deref_mut()
    }

    /// Reset per-send state: flags, digest, session id and tree id.
    pub fn reset(&mut self) {
        self.flags = HeaderFlags::NONE;
        self.digest = None;
        self.session_id = 0;
        self.tree_id = 0;
    }

    /// Encode this message (and its compound chain) into `dst` at `offset`.
    ///
    /// Writes the fixed header, delegates the body, then recursively encodes
    /// chained messages at 8-byte-aligned offsets and backfills this link's
    /// next-command field. Each link is signed over exactly its own span
    /// (padding included for non-final links) once its bytes are final.
    ///
    /// Returns the total encoded length including chained messages. `dst`
    /// must be large enough for the whole chain.
    pub fn encode(&mut self, dst: &mut [u8], offset: usize) -> usize {
        let start = offset;
        self.header_start = start;
        let mut index = start + self.write_header(dst, start);
        index += self.body.write_body(dst, index);
        self.length = index - start;

        let mut total = self.length;
        let own_span = if let Some(next) = self.next.as_mut() {
            // padding up to the next link is covered by this link's signature
            let next_start = start + size8(index - start);
            dst[index..next_start].fill(0);
            total = (next_start - start) + next.encode(dst, next_start);
            self.next_command = (next_start - start) as u32;
            put_u32(dst, start + 20, self.next_command);
            next_start - start
        } else {
            self.next_command = 0;
            self.length
        };

        if let Some(digest) = &self.digest {
            digest.sign(dst, start, own_span);
        }

        if self.retain_payload {
            self.raw_payload = Some(dst[start..start + total].to_vec());
        }

        total
    }

    /// Decode one message from `buffer` at `offset`.
    ///
    /// `compound` marks a multi-part compound receive: the final link of such
    /// a receive (next-command 0) consumes the remaining declared read size
    /// as its trailing bytes.
    ///
    /// Returns the number of bytes this message accounts for, including the
    /// alignment padding of non-final compound links.
    pub fn decode(
        &mut self,
        buffer: &[u8],
        offset: usize,
        compound: bool,
    ) -> Result<usize, DecodeError> {
        let start = offset;
        self.header_start = start;
        let mut index = start + self.read_header(buffer, start)?;

        if self.is_error_response_status() {
            index += self.read_error_response(buffer, index)?;
        } else {
            index += self.body.read_body(buffer, index)?;
        }

        self.length = index - start;
        let mut len = self.length;

        if self.next_command != 0 && self.next_command % 8 != 0 {
            return Err(DecodeError::MisalignedChain(self.next_command));
        }

        if self.next_command != 0 {
            // padding becomes part of the verified span for non-final links
            len += pad8(start, index);
        } else if compound && self.read_size > self.length {
            // MS-SMB2 3.2.5.1.9: the final response of a compound chain is
            // processed as a message of the remaining receive size
            len += self.read_size - self.length;
        }

        if buffer.len() < start + len {
            return Err(DecodeError::BufferTooShort {
                needed: start + len,
                available: buffer.len(),
            });
        }

        self.finish_decode(buffer, start, len)?;
        Ok(len)
    }

    /// Whether the status marks this as an error response (interim
    /// multi-round-trip statuses excluded).
    pub fn is_error_response_status(&self) -> bool {
        self.status != 0 && self.status != NT_STATUS_MORE_PROCESSING_REQUIRED
    }

    /// Response lifecycle hook: runs over the exact consumed byte range,
    /// uniformly for single and chained messages.
    fn finish_decode(&mut self, buffer: &[u8], start: usize, len: usize) -> Result<(), DecodeError> {
        if self.retain_payload {
            self.raw_payload = Some(buffer[start..start + len].to_vec());
        }
        self.verify_signature(buffer, start, len)
    }

    /// Signing-gate verification policy for received messages.
    fn verify_signature(&self, buffer: &[u8], start: usize, len: usize) -> Result<(), DecodeError> {
        let Some(digest) = &self.digest else {
            return Ok(());
        };
        if !self.flags.is_response() {
            return Ok(());
        }
        // async interim placeholders are never signed by the server
        if self.flags.is_async() && self.status == NT_STATUS_PENDING {
            return Ok(());
        }
        // error responses are only verified under mandatory secure-negotiate
        if self.is_error_response_status() && !self.require_secure_negotiate {
            return Ok(());
        }
        if digest.verify(buffer, start, len, 0) {
            tracing::warn!(mid = self.mid, command = %self.command, "signature verification failed");
            return Err(DecodeError::SignatureVerification { mid: self.mid });
        }
        Ok(())
    }

    fn write_header(&mut self, dst: &mut [u8], offset: usize) -> usize {
        dst[offset..offset + 4].copy_from_slice(&SMB2_PROTOCOL_ID);
        put_u16(dst, offset + 4, SMB2_HEADER_LENGTH as u16);
        put_u16(dst, offset + 6, self.credit_charge);
        put_u32(dst, offset + 8, self.status);
        put_u16(dst, offset + 12, self.command.as_code());
        put_u16(dst, offset + 14, self.credit);
        put_u32(dst, offset + 16, self.flags.bits());
        put_u32(dst, offset + 20, 0); // next command, backfilled when chained
        put_u64(dst, offset + 24, self.mid);
        if self.flags.is_async() {
            put_u64(dst, offset + 32, self.async_id);
        } else {
            put_u32(dst, offset + 32, 0); // reserved
            put_u32(dst, offset + 36, self.tree_id);
        }
        put_u64(dst, offset + 40, self.session_id);
        dst[offset + SIGNATURE_OFFSET..offset + SIGNATURE_OFFSET + SIGNATURE_LENGTH].fill(0);
        SMB2_HEADER_LENGTH
    }

    fn read_header(&mut self, buffer: &[u8], offset: usize) -> Result<usize, DecodeError> {
        if buffer.len() < offset + SMB2_HEADER_LENGTH {
            return Err(DecodeError::BufferTooShort {
                needed: offset + SMB2_HEADER_LENGTH,
                available: buffer.len(),
            });
        }
        if buffer[offset..offset + 4] != SMB2_PROTOCOL_ID {
            return Err(DecodeError::BadProtocolId);
        }

        self.credit_charge = get_u16(buffer, offset + 6);
        self.status = get_u32(buffer, offset + 8);
        let code = get_u16(buffer, offset + 12);
        self.command = Command::from_code(code).ok_or(DecodeError::UnknownCommand(code))?;
        self.credit = get_u16(buffer, offset + 14);
        self.flags = HeaderFlags::from_bits(get_u32(buffer, offset + 16));
        self.next_command = get_u32(buffer, offset + 20);
        self.mid = get_u64(buffer, offset + 24);

        if self.flags.is_async() {
            self.async_id = get_u64(buffer, offset + 32);
        } else {
            // 4 reserved bytes precede the tree id
            self.tree_id = get_u32(buffer, offset + 36);
        }
        self.session_id = get_u64(buffer, offset + 40);
        self.signature
            .copy_from_slice(&buffer[offset + SIGNATURE_OFFSET..offset + SIGNATURE_OFFSET + SIGNATURE_LENGTH]);

        Ok(SMB2_HEADER_LENGTH)
    }

    fn read_error_response(&mut self, buffer: &[u8], offset: usize) -> Result<usize, DecodeError> {
        if buffer.len() < offset + 8 {
            return Err(DecodeError::BufferTooShort {
                needed: offset + 8,
                available: buffer.len(),
            });
        }
        let structure_size = get_u16(buffer, offset);
        if structure_size != ERROR_STRUCTURE_SIZE {
            return Err(DecodeError::BadErrorStructureSize(structure_size));
        }
        self.error_context_count = buffer[offset + 2];

        let byte_count = get_u32(buffer, offset + 4) as usize;
        let mut consumed = 8;
        if byte_count > 0 {
            if buffer.len() < offset + 8 + byte_count {
                return Err(DecodeError::BufferTooShort {
                    needed: offset + 8 + byte_count,
                    available: buffer.len(),
                });
            }
            self.error_data = Some(buffer[offset + 8..offset + 8 + byte_count].to_vec());
            consumed += byte_count;
        }
        Ok(consumed)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("command", &self.command)
            .field("mid", &self.mid)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.mid == other.mid
    }
}

impl Eq for Message {}

impl Hash for Message {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mid.hash(state);
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command={},status={:#010x},flags={:#010x},mid={}",
            self.command,
            self.status,
            self.flags.bits(),
            self.mid
        )
    }
}
