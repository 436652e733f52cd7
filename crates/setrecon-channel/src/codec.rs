//! Typed framing over a [`Channel`].
//!
//! Fixed width integers are big-endian. Arbitrary precision integers carry
//! a `u32` byte length followed by their big-endian magnitude. Field
//! elements are written at the fixed width of their field, which both
//! peers must have agreed on through a modulus handshake. Sequences carry a
//! `u64` count.

use async_trait::async_trait;
use num::BigUint;
use setrecon_core::{Element, PrimeField};

use crate::channel::Channel;
use crate::error::{ChannelError, Result};

/// Framing limits applied when decoding length prefixes.
pub mod limits {
    /// Max bytes in a self-describing big integer.
    pub const MAX_INTEGER_BYTES: u64 = 1 << 16;
    /// Max bytes in a single blob or element.
    pub const MAX_BLOB_BYTES: u64 = 64 << 20;
    /// Max items in one transmitted sequence.
    pub const MAX_LIST_LEN: u64 = 1 << 24;
    /// Max buffered chunks in one direction of an in-memory channel.
    pub const MEMORY_CHANNEL_DEPTH: usize = 1024;
}

fn check_limit(what: &'static str, len: u64, max: u64) -> Result<()> {
    if len > max {
        return Err(ChannelError::TooLarge { what, len, max });
    }
    Ok(())
}

/// Typed send and receive helpers, available on every [`Channel`].
#[async_trait]
pub trait ChannelExt: Channel {
    async fn send_u8(&mut self, value: u8) -> Result<()> {
        self.send_bytes(&[value]).await
    }

    async fn recv_u8(&mut self) -> Result<u8> {
        Ok(self.recv_bytes(1).await?[0])
    }

    async fn send_u64(&mut self, value: u64) -> Result<()> {
        self.send_bytes(&value.to_be_bytes()).await
    }

    async fn recv_u64(&mut self) -> Result<u64> {
        let bytes = self.recv_bytes(8).await?;
        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes);
        Ok(u64::from_be_bytes(word))
    }

    /// Send a length-prefixed byte string.
    async fn send_blob(&mut self, bytes: &[u8]) -> Result<()> {
        self.send_u64(bytes.len() as u64).await?;
        self.send_bytes(bytes).await
    }

    async fn recv_blob(&mut self) -> Result<Vec<u8>> {
        let len = self.recv_u64().await?;
        check_limit("blob", len, limits::MAX_BLOB_BYTES)?;
        self.recv_bytes(len as usize).await
    }

    /// Send a big integer with a self-describing length.
    async fn send_biguint(&mut self, value: &BigUint) -> Result<()> {
        let bytes = if value.bits() == 0 {
            Vec::new()
        } else {
            value.to_bytes_be()
        };
        self.send_bytes(&(bytes.len() as u32).to_be_bytes()).await?;
        self.send_bytes(&bytes).await
    }

    async fn recv_biguint(&mut self) -> Result<BigUint> {
        let header = self.recv_bytes(4).await?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&header);
        let len = u32::from_be_bytes(word) as u64;
        check_limit("integer", len, limits::MAX_INTEGER_BYTES)?;
        let bytes = self.recv_bytes(len as usize).await?;
        Ok(BigUint::from_bytes_be(&bytes))
    }

    /// Send a big integer left-padded to exactly `width` bytes.
    async fn send_biguint_sized(&mut self, value: &BigUint, width: usize) -> Result<()> {
        let bytes = value.to_bytes_be();
        let significant = if value.bits() == 0 { 0 } else { bytes.len() };
        if significant > width {
            return Err(ChannelError::EncodingError(format!(
                "integer needs {} bytes, field width is {}",
                significant, width
            )));
        }
        let mut padded = vec![0u8; width - significant];
        padded.extend_from_slice(&bytes[bytes.len() - significant..]);
        self.send_bytes(&padded).await
    }

    async fn recv_biguint_sized(&mut self, width: usize) -> Result<BigUint> {
        let bytes = self.recv_bytes(width).await?;
        Ok(BigUint::from_bytes_be(&bytes))
    }

    /// Send one field element at the field's fixed width.
    async fn send_field_elem(&mut self, field: &PrimeField, value: &BigUint) -> Result<()> {
        self.send_biguint_sized(&field.reduce(value), field.element_len()).await
    }

    async fn recv_field_elem(&mut self, field: &PrimeField) -> Result<BigUint> {
        let value = self.recv_biguint_sized(field.element_len()).await?;
        if &value >= field.modulus() {
            return Err(ChannelError::DecodingError(
                "field element is not reduced".into(),
            ));
        }
        Ok(value)
    }

    /// Send a counted vector of field elements.
    async fn send_field_vec(&mut self, field: &PrimeField, values: &[BigUint]) -> Result<()> {
        self.send_u64(values.len() as u64).await?;
        for v in values {
            self.send_field_elem(field, v).await?;
        }
        Ok(())
    }

    async fn recv_field_vec(&mut self, field: &PrimeField) -> Result<Vec<BigUint>> {
        let count = self.recv_u64().await?;
        check_limit("field vector", count, limits::MAX_LIST_LEN)?;
        let mut out = Vec::with_capacity(count as usize);
        for _ in 0..count {
            out.push(self.recv_field_elem(field).await?);
        }
        Ok(out)
    }

    async fn send_element(&mut self, element: &Element) -> Result<()> {
        self.send_blob(&element.to_bytes()).await
    }

    async fn recv_element(&mut self) -> Result<Element> {
        Ok(Element::from_bytes(&self.recv_blob().await?))
    }

    /// Send a counted list of elements.
    async fn send_elements(&mut self, elements: &[Element]) -> Result<()> {
        self.send_u64(elements.len() as u64).await?;
        for e in elements {
            self.send_element(e).await?;
        }
        Ok(())
    }

    async fn recv_elements(&mut self) -> Result<Vec<Element>> {
        let count = self.recv_u64().await?;
        check_limit("element list", count, limits::MAX_LIST_LEN)?;
        let mut out = Vec::with_capacity(count as usize);
        for _ in 0..count {
            out.push(self.recv_element().await?);
        }
        Ok(out)
    }
}

impl<C: Channel + ?Sized> ChannelExt for C {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryChannel;

    #[tokio::test]
    async fn test_scalar_framing() {
        let (mut a, mut b) = MemoryChannel::pair();
        a.send_u8(3).await.unwrap();
        a.send_u64(0x0102_0304_0506_0708).await.unwrap();
        assert_eq!(b.recv_bytes(1).await.unwrap(), vec![3]);
        assert_eq!(
            b.recv_bytes(8).await.unwrap(),
            vec![1, 2, 3, 4, 5, 6, 7, 8]
        );
    }

    #[tokio::test]
    async fn test_biguint_framing() {
        let (mut a, mut b) = MemoryChannel::pair();
        let big = BigUint::from(1u32) << 100u32;
        a.send_biguint(&big).await.unwrap();
        a.send_biguint(&BigUint::from(0u32)).await.unwrap();
        assert_eq!(b.recv_biguint().await.unwrap(), big);
        assert_eq!(b.recv_biguint().await.unwrap(), BigUint::from(0u32));
        assert_eq!(a.bytes_sent(), 4 + 13 + 4);
        assert_eq!(b.bytes_received(), a.bytes_sent());
    }

    #[tokio::test]
    async fn test_field_elements_are_fixed_width() {
        let field = PrimeField::new(BigUint::from(263u32)).unwrap();
        let (mut a, mut b) = MemoryChannel::pair();
        let values = vec![BigUint::from(1u32), BigUint::from(262u32), BigUint::from(0u32)];
        a.send_field_vec(&field, &values).await.unwrap();
        assert_eq!(a.bytes_sent(), 8 + 3 * 2);
        assert_eq!(b.recv_field_vec(&field).await.unwrap(), values);
    }

    #[tokio::test]
    async fn test_unreduced_field_element_rejected() {
        let field = PrimeField::new(BigUint::from(263u32)).unwrap();
        let (mut a, mut b) = MemoryChannel::pair();
        a.send_biguint_sized(&BigUint::from(300u32), 2).await.unwrap();
        assert!(matches!(
            b.recv_field_elem(&field).await,
            Err(ChannelError::DecodingError(_))
        ));
    }

    #[tokio::test]
    async fn test_sized_integer_too_wide() {
        let (mut a, _b) = MemoryChannel::pair();
        assert!(matches!(
            a.send_biguint_sized(&BigUint::from(70_000u32), 2).await,
            Err(ChannelError::EncodingError(_))
        ));
    }

    #[tokio::test]
    async fn test_element_lists() {
        let (mut a, mut b) = MemoryChannel::pair();
        let elems = vec![Element::from_u64(0), Element::from_bytes(b"hello"), Element::from_u64(9)];
        a.send_elements(&elems).await.unwrap();
        assert_eq!(b.recv_elements().await.unwrap(), elems);
    }

    #[tokio::test]
    async fn test_oversized_list_rejected() {
        let (mut a, mut b) = MemoryChannel::pair();
        a.send_u64(limits::MAX_LIST_LEN + 1).await.unwrap();
        assert!(matches!(
            b.recv_elements().await,
            Err(ChannelError::TooLarge { what: "element list", .. })
        ));
    }
}
