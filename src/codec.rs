//! Map codec: read values out of IO spaces and write them back.
//!
//! Handles integers of any width at any bit offset (configurable byte order for
//! byte-aligned, byte-multiple integers; big-endian bit order otherwise), NUL-terminated
//! strings, offsets, and structs laid out field after field. Every device access goes
//! through [`IosTable::pread`] / [`IosTable::pwrite`].

use crate::exception::{Exception, ExceptionCode};
use crate::ios::{IosId, IosTable};
use crate::value::{mask_bits, sign_extend, MapInfo, Type, Value, ValueHeap};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Big,
    Little,
}

/// Reads and writes values at bit offsets of open IO spaces.
pub(crate) struct Mapper<'a> {
    pub heap: &'a mut ValueHeap,
    pub ios: &'a mut IosTable,
    pub endianness: Endianness,
}

/// Byte position and length covering `width` bits at bit offset `offset`.
fn byte_extent(offset: u64, width: u32) -> (u64, usize, u32) {
    let shift = (offset % 8) as u32;
    let nbytes = (shift + width).div_ceil(8) as usize;
    (offset / 8, nbytes, shift)
}

/// Bit offset `bits` past `offset`, or `E_out_of_bounds` when it leaves the address space.
pub(crate) fn advance(offset: u64, bits: u64) -> Result<u64, Exception> {
    offset.checked_add(bits).ok_or_else(|| {
        Exception::new(
            ExceptionCode::OutOfBounds,
            format!("{} bit(s) past bit offset {} overflow the address space", bits, offset),
        )
    })
}

fn mask128(width: u32) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

impl Mapper<'_> {
    /// Read a value of type `ty` at bit `offset` of `ios`.
    pub fn read(&mut self, ty: &Type, ios: IosId, offset: u64, strict: bool) -> Result<Value, Exception> {
        match ty {
            Type::Integral { size, signed } => {
                let bits = self.read_bits(ios, offset, *size, strict)?;
                Ok(self.heap.integral_from_bits(bits, *size, *signed))
            }
            Type::String => self.read_string(ios, offset, strict),
            Type::Offset { base, unit } => {
                if !base.is_integral() {
                    return Err(Exception::new(ExceptionCode::Map, "offset magnitude must be integral"));
                }
                let magnitude = self.read(base, ios, offset, strict)?;
                let unit = self.heap.uint(*unit, 64);
                Ok(self.heap.offset_unchecked(magnitude, unit))
            }
            Type::Struct { name, fields } => {
                let mut cur = offset;
                let mut values = Vec::with_capacity(fields.len());
                for (field_name, field_ty) in fields {
                    let v = self.read(field_ty, ios, cur, strict)?;
                    cur = advance(cur, self.heap.size_bits(v))?;
                    values.push((field_name.clone(), v));
                }
                let map = MapInfo { mapped: true, strict, ios: Some(ios), offset: Some(offset) };
                Ok(self.heap.struct_value(name.clone(), values, map))
            }
        }
    }

    /// Write `value` at bit `offset` of `ios`, laid out by its own shape.
    pub fn write(&mut self, value: Value, ios: IosId, offset: u64, strict: bool) -> Result<(), Exception> {
        if let Some(int) = self.heap.integral(value) {
            let bits = mask_bits(int.value as u64, int.width);
            return self.write_bits(ios, offset, bits, int.width, strict);
        }
        if let Some(bytes) = self.heap.string_bytes(value) {
            let mut data = bytes.to_vec();
            data.push(0);
            return self.write_string(ios, offset, &data, strict);
        }
        if let Some(magnitude) = self.heap.offset_magnitude(value) {
            return self.write(magnitude, ios, offset, strict);
        }
        if let Some(fields) = self.heap.struct_fields(value) {
            let fields: Vec<Value> = fields.iter().map(|(_, v)| *v).collect();
            let mut cur = offset;
            for field in fields {
                self.write(field, ios, cur, strict)?;
                cur = advance(cur, self.heap.size_bits(field))?;
            }
            return Ok(());
        }
        Err(Exception::new(ExceptionCode::Map, "value cannot be mapped"))
    }

    fn check_extent(&self, ios: IosId, byte: u64, nbytes: usize, strict: bool) -> Result<(), Exception> {
        if !strict {
            return Ok(());
        }
        let size = self.ios.size(ios)?;
        match byte.checked_add(nbytes as u64) {
            Some(end) if end <= size => Ok(()),
            _ => Err(Exception::new(
                ExceptionCode::Eof,
                format!("{} byte(s) at {} past the end of IO space {}", nbytes, byte, ios),
            )),
        }
    }

    fn read_bits(&mut self, ios: IosId, offset: u64, width: u32, strict: bool) -> Result<u64, Exception> {
        let (byte, nbytes, shift) = byte_extent(offset, width);
        self.check_extent(ios, byte, nbytes, strict)?;
        let mut storage = [0u8; 9];
        let buf = &mut storage[..nbytes];
        self.ios.pread(ios, byte, buf)?;
        if shift == 0 && width % 8 == 0 {
            return Ok(match self.endianness {
                Endianness::Big => BigEndian::read_uint(buf, nbytes),
                Endianness::Little => LittleEndian::read_uint(buf, nbytes),
            });
        }
        let acc = BigEndian::read_uint128(buf, nbytes);
        let low = nbytes as u32 * 8 - shift - width;
        Ok(((acc >> low) & mask128(width)) as u64)
    }

    fn write_bits(&mut self, ios: IosId, offset: u64, bits: u64, width: u32, strict: bool) -> Result<(), Exception> {
        let (byte, nbytes, shift) = byte_extent(offset, width);
        self.check_extent(ios, byte, nbytes, strict)?;
        let mut storage = [0u8; 9];
        let buf = &mut storage[..nbytes];
        if shift == 0 && width % 8 == 0 {
            match self.endianness {
                Endianness::Big => BigEndian::write_uint(buf, bits, nbytes),
                Endianness::Little => LittleEndian::write_uint(buf, bits, nbytes),
            }
            self.ios.pwrite(ios, byte, buf)?;
            return Ok(());
        }
        // Partial bytes: keep the neighbouring bits already on the device.
        match self.ios.pread(ios, byte, buf) {
            Ok(()) => {}
            Err(e) => {
                let exc = Exception::from(e);
                if exc.code != ExceptionCode::Eof {
                    return Err(exc);
                }
                buf.fill(0);
            }
        }
        let low = nbytes as u32 * 8 - shift - width;
        let field = mask128(width) << low;
        let acc = BigEndian::read_uint128(buf, nbytes);
        let acc = (acc & !field) | ((u128::from(bits) << low) & field);
        BigEndian::write_uint128(buf, acc, nbytes);
        self.ios.pwrite(ios, byte, buf)?;
        Ok(())
    }

    fn read_string(&mut self, ios: IosId, offset: u64, strict: bool) -> Result<Value, Exception> {
        if offset % 8 != 0 {
            return Err(Exception::new(ExceptionCode::Map, "strings must be mapped at byte boundaries"));
        }
        let mut pos = offset / 8;
        let mut bytes = Vec::new();
        loop {
            self.check_extent(ios, pos, 1, strict)?;
            let mut b = [0u8; 1];
            self.ios.pread(ios, pos, &mut b)?;
            if b[0] == 0 {
                break;
            }
            bytes.push(b[0]);
            pos += 1;
        }
        Ok(self.heap.make_string(bytes))
    }

    fn write_string(&mut self, ios: IosId, offset: u64, data: &[u8], strict: bool) -> Result<(), Exception> {
        if offset % 8 != 0 {
            return Err(Exception::new(ExceptionCode::Map, "strings must be mapped at byte boundaries"));
        }
        self.check_extent(ios, offset / 8, data.len(), strict)?;
        self.ios.pwrite(ios, offset / 8, data)?;
        Ok(())
    }
}

/// Sign-extend or mask raw bits to a signed or unsigned value of `width` bits.
pub(crate) fn fit_bits(bits: u64, width: u32, signed: bool) -> i128 {
    if signed {
        i128::from(sign_extend(bits, width))
    } else {
        i128::from(mask_bits(bits, width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iod::{IodRegistry, IosFlags, MAX_IODS};

    fn setup() -> (ValueHeap, IosTable, IosId) {
        let mut registry = IodRegistry::with_builtins(MAX_IODS);
        let mut table = IosTable::new();
        let id = table.open(&mut registry, "*codec*", IosFlags::empty(), true).expect("open");
        (ValueHeap::new(), table, id)
    }

    #[test]
    fn byte_extent_of_unaligned_fields() {
        assert_eq!(byte_extent(0, 8), (0, 1, 0));
        assert_eq!(byte_extent(4, 8), (0, 2, 4));
        assert_eq!(byte_extent(60, 64), (7, 9, 4));
        assert_eq!(byte_extent(3, 3), (0, 1, 3));
    }

    #[test]
    fn big_and_little_endian_u16() {
        let (mut heap, mut table, id) = setup();
        table.pwrite(id, 0, &[0x12, 0x34]).expect("write");
        let ty = Type::Integral { size: 16, signed: false };
        let mut m = Mapper { heap: &mut heap, ios: &mut table, endianness: Endianness::Big };
        let v = m.read(&ty, id, 0, true).expect("read");
        assert_eq!(m.heap.uint_value(v), Some(0x1234));
        m.endianness = Endianness::Little;
        let v = m.read(&ty, id, 0, true).expect("read");
        assert_eq!(m.heap.uint_value(v), Some(0x3412));
    }

    #[test]
    fn unaligned_write_keeps_neighbours() {
        let (mut heap, mut table, id) = setup();
        table.pwrite(id, 0, &[0xff, 0xff]).expect("write");
        let mut m = Mapper { heap: &mut heap, ios: &mut table, endianness: Endianness::Big };
        let v = m.heap.make_uint(0, 4).expect("uint");
        m.write(v, id, 6, true).expect("write nibble");
        let mut buf = [0u8; 2];
        table.pread(id, 0, &mut buf).expect("read");
        assert_eq!(buf, [0xfc, 0x3f]);
    }

    #[test]
    fn signed_unaligned_read() {
        let (mut heap, mut table, id) = setup();
        table.pwrite(id, 0, &[0b0111_0000]).expect("write");
        let ty = Type::Integral { size: 3, signed: true };
        let mut m = Mapper { heap: &mut heap, ios: &mut table, endianness: Endianness::Big };
        let v = m.read(&ty, id, 1, true).expect("read");
        assert_eq!(m.heap.int_value(v), Some(-1));
    }

    #[test]
    fn strings_are_nul_terminated() {
        let (mut heap, mut table, id) = setup();
        let mut m = Mapper { heap: &mut heap, ios: &mut table, endianness: Endianness::Big };
        let s = m.heap.make_string("abc");
        m.write(s, id, 16, true).expect("write");
        let v = m.read(&Type::String, id, 16, true).expect("read");
        assert_eq!(m.heap.string(v), Some("abc"));
        assert!(m.read(&Type::String, id, 17, true).is_err());
    }

    #[test]
    fn strict_read_past_end_raises_eof() {
        let (mut heap, mut table, id) = setup();
        let size = table.size(id).expect("size");
        let ty = Type::Integral { size: 32, signed: false };
        let mut m = Mapper { heap: &mut heap, ios: &mut table, endianness: Endianness::Big };
        let err = m.read(&ty, id, (size - 2) * 8, true).expect_err("eof");
        assert_eq!(err.code, ExceptionCode::Eof);
    }

    #[test]
    fn advance_stops_at_address_space_end() {
        assert_eq!(advance(8, 16).expect("fits"), 24);
        let err = advance(u64::MAX - 3, 8).expect_err("overflow");
        assert_eq!(err.code, ExceptionCode::OutOfBounds);
    }

    #[test]
    fn fit_bits_sign_and_mask() {
        assert_eq!(fit_bits(0xff, 8, true), -1);
        assert_eq!(fit_bits(0x1ff, 8, false), 0xff);
    }
}
