use crate::{BitReader, BitWrite, Serde, SerdeErr};

pub type UnsignedInteger<const BITS: u8> = SerdeInteger<false, false, BITS>;
pub type SignedInteger<const BITS: u8> = SerdeInteger<true, false, BITS>;
pub type UnsignedVariableInteger<const BITS: u8> = SerdeInteger<false, true, BITS>;
pub type SignedVariableInteger<const BITS: u8> = SerdeInteger<true, true, BITS>;

// The generic wrapper delegates to a non-generic inner type so each
// instantiation stays small.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct SerdeInteger<const SIGNED: bool, const VARIABLE: bool, const BITS: u8> {
    inner: SerdeIntegerInner,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
struct SerdeIntegerInner {
    inner_value: i128,
    signed: bool,
    variable: bool,
    bits: u8,
}

impl SerdeIntegerInner {
    fn new(signed: bool, variable: bool, bits: u8, value: i128) -> Self {
        if bits == 0 {
            panic!("can't create an integer with 0 bits...");
        }
        if bits > 127 {
            panic!("can't create an integer with more than 127 bits...");
        }
        if !signed && value < 0 {
            panic!("can't encode a negative number with an Unsigned Integer!");
        }
        if !variable {
            let max_value: i128 = 2_i128.pow(bits as u32);
            if value.abs() >= max_value {
                panic!(
                    "with {} bits, can't encode number with magnitude greater than {}",
                    bits, max_value
                );
            }
        }

        Self {
            inner_value: value,
            signed,
            variable,
            bits,
        }
    }

    fn ser(&self, writer: &mut dyn BitWrite) {
        let negative = self.inner_value < 0;
        let mut value = self.inner_value.unsigned_abs();

        if self.signed {
            writer.write_bit(negative);
        }

        if self.variable {
            loop {
                let proceed = value >= 2_u128.pow(self.bits as u32);
                writer.write_bit(proceed);
                for _ in 0..self.bits {
                    writer.write_bit(value & 1 != 0);
                    value >>= 1;
                }
                if !proceed {
                    return;
                }
            }
        } else {
            for _ in 0..self.bits {
                writer.write_bit(value & 1 != 0);
                value >>= 1;
            }
        }
    }

    fn de(
        reader: &mut BitReader,
        signed: bool,
        variable: bool,
        bits: u8,
    ) -> Result<Self, SerdeErr> {
        let negative = if signed { reader.read_bit()? } else { false };

        let mut output: u128 = 0;
        let mut shift: u32 = 0;

        loop {
            let proceed = if variable { reader.read_bit()? } else { false };

            for _ in 0..bits {
                if reader.read_bit()? {
                    if shift >= 127 {
                        return Err(SerdeErr);
                    }
                    output |= 1 << shift;
                }
                shift += 1;
            }

            if !proceed {
                break;
            }
        }

        let value = output as i128;
        Ok(Self {
            inner_value: if negative { -value } else { value },
            signed,
            variable,
            bits,
        })
    }
}

impl<const SIGNED: bool, const VARIABLE: bool, const BITS: u8>
    SerdeInteger<SIGNED, VARIABLE, BITS>
{
    pub fn new<T: Into<i128>>(value: T) -> Self {
        Self {
            inner: SerdeIntegerInner::new(SIGNED, VARIABLE, BITS, value.into()),
        }
    }

    pub fn get(&self) -> i128 {
        self.inner.inner_value
    }
}

impl<const SIGNED: bool, const VARIABLE: bool, const BITS: u8> Serde
    for SerdeInteger<SIGNED, VARIABLE, BITS>
{
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.inner.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            inner: SerdeIntegerInner::de(reader, SIGNED, VARIABLE, BITS)?,
        })
    }
}
