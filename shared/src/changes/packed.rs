//! Packed binary form of a change batch.
//!
//! Layout: a version byte, a variable-length record count, then each record's
//! nine fields in wire order. Value kinds use two bits, booleans one bit and
//! integers variable-length chunks with a continuation bit.

use roomlink_serde::{
    BitReader, BitWrite, BitWriter, Serde, SerdeErr, SignedVariableInteger, UnsignedInteger,
    UnsignedVariableInteger,
};

use crate::RefId;

use super::{ChangeCodecError, ChangeRecord, ChangeValue, FieldKey, Operation, Primitive, ValueKind};

pub const PACKED_VERSION: u8 = 1;

pub(crate) fn encode(records: &[ChangeRecord]) -> Vec<u8> {
    let mut writer = BitWriter::new();
    PACKED_VERSION.ser(&mut writer);
    UnsignedVariableInteger::<9>::new(records.len() as u64).ser(&mut writer);
    for record in records {
        record.ser(&mut writer);
    }
    writer.to_bytes()
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Vec<ChangeRecord>, ChangeCodecError> {
    let mut reader = BitReader::new(bytes);

    let version = u8::de(&mut reader)?;
    if version != PACKED_VERSION {
        return Err(ChangeCodecError::UnsupportedVersion {
            found: version,
            expected: PACKED_VERSION,
        });
    }

    let count = UnsignedVariableInteger::<9>::de(&mut reader)?.get();
    let count = usize::try_from(count).map_err(|_| SerdeErr)?;

    // every record takes at least one byte, so a larger count is a lie
    if count > reader.bytes_remaining() {
        return Err(SerdeErr.into());
    }

    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        records.push(ChangeRecord::de(&mut reader)?);
    }
    Ok(records)
}

fn ser_ref_id(ref_id: RefId, writer: &mut dyn BitWrite) {
    UnsignedVariableInteger::<7>::new(ref_id).ser(writer);
}

fn de_ref_id(reader: &mut BitReader) -> Result<RefId, SerdeErr> {
    let value = UnsignedVariableInteger::<7>::de(reader)?.get();
    RefId::try_from(value).map_err(|_| SerdeErr)
}

impl Serde for FieldKey {
    fn ser(&self, writer: &mut dyn BitWrite) {
        match self {
            Self::Index(index) => {
                writer.write_bit(true);
                UnsignedVariableInteger::<7>::new(*index).ser(writer);
            }
            Self::Name(name) => {
                writer.write_bit(false);
                name.ser(writer);
            }
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        if reader.read_bit()? {
            let index = UnsignedVariableInteger::<7>::de(reader)?.get();
            Ok(Self::Index(u32::try_from(index).map_err(|_| SerdeErr)?))
        } else {
            Ok(Self::Name(String::de(reader)?))
        }
    }
}

impl Serde for Primitive {
    fn ser(&self, writer: &mut dyn BitWrite) {
        match self {
            Self::Null => UnsignedInteger::<3>::new(0u8).ser(writer),
            Self::Boolean(value) => {
                UnsignedInteger::<3>::new(1u8).ser(writer);
                value.ser(writer);
            }
            Self::Integer(value) => {
                UnsignedInteger::<3>::new(2u8).ser(writer);
                SignedVariableInteger::<7>::new(*value).ser(writer);
            }
            Self::Float(value) => {
                UnsignedInteger::<3>::new(3u8).ser(writer);
                value.ser(writer);
            }
            Self::Text(value) => {
                UnsignedInteger::<3>::new(4u8).ser(writer);
                value.ser(writer);
            }
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        match UnsignedInteger::<3>::de(reader)?.get() {
            0 => Ok(Self::Null),
            1 => Ok(Self::Boolean(bool::de(reader)?)),
            2 => {
                let value = SignedVariableInteger::<7>::de(reader)?.get();
                Ok(Self::Integer(i64::try_from(value).map_err(|_| SerdeErr)?))
            }
            3 => Ok(Self::Float(f64::de(reader)?)),
            4 => Ok(Self::Text(String::de(reader)?)),
            _ => Err(SerdeErr),
        }
    }
}

impl Serde for ChangeValue {
    fn ser(&self, writer: &mut dyn BitWrite) {
        UnsignedInteger::<2>::new(self.kind().code()).ser(writer);
        match self {
            Self::Primitive(primitive) => primitive.ser(writer),
            Self::Reference(ref_id) => ser_ref_id(*ref_id, writer),
            Self::Absent | Self::Unrepresentable => {}
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let code = UnsignedInteger::<2>::de(reader)?.get();
        let kind = u8::try_from(code)
            .ok()
            .and_then(ValueKind::from_code)
            .ok_or(SerdeErr)?;
        match kind {
            ValueKind::Absent => Ok(Self::Absent),
            ValueKind::Primitive => Ok(Self::Primitive(Primitive::de(reader)?)),
            ValueKind::Reference => Ok(Self::Reference(de_ref_id(reader)?)),
            ValueKind::Unrepresentable => Ok(Self::Unrepresentable),
        }
    }
}

impl Serde for ChangeRecord {
    fn ser(&self, writer: &mut dyn BitWrite) {
        ser_ref_id(self.ref_id, writer);
        self.op.code().ser(writer);
        self.field.ser(writer);
        self.dynamic_index.ser(writer);
        self.is_schema.ser(writer);
        self.value.ser(writer);
        self.previous_value.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            ref_id: de_ref_id(reader)?,
            op: Operation(u8::de(reader)?),
            field: FieldKey::de(reader)?,
            dynamic_index: Option::<FieldKey>::de(reader)?,
            is_schema: bool::de(reader)?,
            value: ChangeValue::de(reader)?,
            previous_value: ChangeValue::de(reader)?,
        })
    }
}
