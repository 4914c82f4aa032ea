//! XOR masking as required by RFC 6455 §5.3.
//!
//! The mask is a pure, stateless operation over its arguments: a 4-byte key and a running
//! byte offset, so a payload can be masked or unmasked incrementally across multiple chunks
//! without ever needing the whole payload in memory at once.

/// XORs every byte of `data` in place with `key[(offset + i) % 4]`.
///
/// Applying this twice with the same `key` and `offset` is an involution: it undoes itself.
/// Used both when a client masks outgoing frames and when a server unmasks incoming ones.
pub(crate) fn apply_mask(data: &mut [u8], key: [u8; 4], offset: usize) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= key[(offset + i) % 4];
    }
}
