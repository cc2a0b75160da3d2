//! # Register File
//!
//! A byte-exact mirror of the inferior's kernel register dump, plus the
//! typed read and write engine over it.
//!
//! The buffer has the shape of the kernel's per-process `user` structure:
//! the GPR block (`user_regs_struct`), the FPR/SSE block
//! (`user_fpregs_struct`, the "i387" area), and the eight-slot debug
//! register array. Catalog offsets index directly into it.
//!
//! The file itself never talks to the kernel. Reads interpret bytes that
//! the owning [`crate::process::Process`] refreshed at the last stop;
//! writes stage bytes into the buffer and report a [`FlushPlan`] telling
//! the process what to push back — the whole FPR block for floating-point
//! registers, or one 8-byte-aligned user-area word for everything else.
//! Routing the flush through the process keeps the invariant that after a
//! successful write the buffer and the inferior agree on the bytes touched.

use std::mem;

use crate::bits;
use crate::error::{GrapnelError, Result};
use crate::registers::info::{RegisterFormat, RegisterId, RegisterInfo, RegisterType};
use crate::registers::value::{extended_from_f64, RegisterValue};
use crate::registers::register_info_by_id;

/// What the owning process must push to the kernel after a staged write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FlushPlan
{
    /// Write the entire FPR/SSE block back (`PTRACE_SETFPREGS`).
    FprBlock,
    /// Poke one 8-byte word of the user area (`PTRACE_POKEUSER`).
    UserWord
    {
        /// 8-byte-aligned offset into the user area.
        offset: usize,
        /// The word to poke, as currently staged in the buffer.
        word: u64,
    },
}

/// Mirror of the inferior's register state as of the most recent stop.
pub struct RegisterFile
{
    data: libc::user,
}

impl RegisterFile
{
    /// Create a zeroed register file.
    ///
    /// The buffer holds meaningful values only once the owning process has
    /// refreshed it from a stopped inferior.
    pub(crate) fn new() -> Self
    {
        Self {
            // SAFETY: libc::user is a plain-data FFI struct; all-zero is a
            // valid (if meaningless) register dump.
            data: unsafe { mem::zeroed() },
        }
    }

    /// Read a register according to its catalog descriptor.
    ///
    /// The bits at `info.offset` are interpreted per `info.format` with no
    /// sign extension: `Uint` yields the unsigned arm of the register's
    /// width, `DoubleFloat` an `F64`, `LongDouble` the raw 80-bit bytes,
    /// and `Vector` an 8- or 16-byte array.
    ///
    /// ## Errors
    ///
    /// Fails with [`GrapnelError::InvalidRegister`] when a `Uint` entry has
    /// a width other than 1, 2, 4, or 8.
    pub fn read(&self, info: &RegisterInfo) -> Result<RegisterValue>
    {
        let bytes = bits::as_bytes(&self.data);
        let at = &bytes[info.offset..];

        match info.format {
            RegisterFormat::Uint => match info.size {
                1 => Ok(RegisterValue::U8(bits::from_bytes(at))),
                2 => Ok(RegisterValue::U16(bits::from_bytes(at))),
                4 => Ok(RegisterValue::U32(bits::from_bytes(at))),
                8 => Ok(RegisterValue::U64(bits::from_bytes(at))),
                other => Err(GrapnelError::InvalidRegister(format!(
                    "{} has unsupported uint width {}",
                    info.name, other
                ))),
            },
            RegisterFormat::DoubleFloat => Ok(RegisterValue::F64(bits::from_bytes(at))),
            RegisterFormat::LongDouble => Ok(RegisterValue::F80(bits::from_bytes(at))),
            RegisterFormat::Vector if info.size == 8 => Ok(RegisterValue::Byte64(bits::from_bytes(at))),
            RegisterFormat::Vector => Ok(RegisterValue::Byte128(bits::from_bytes(at))),
        }
    }

    /// Read a register by catalog id.
    ///
    /// ## Errors
    ///
    /// Propagates catalog-lookup and read failures.
    pub fn read_by_id(&self, id: RegisterId) -> Result<RegisterValue>
    {
        self.read(register_info_by_id(id)?)
    }

    /// Stage a typed value into the buffer and describe the needed flush.
    ///
    /// The value is widened into a 16-byte staging area — floats are
    /// promoted to the register's floating format, signed integers are
    /// sign-extended to the register's width, everything else is
    /// zero-extended — and `info.size` bytes land at `info.offset`.
    ///
    /// ## Panics
    ///
    /// Panics when the value is wider than the register. That is a
    /// programmer error on the caller's side; silently truncating register
    /// writes would corrupt the inferior.
    pub(crate) fn stage_write(&mut self, info: &RegisterInfo, value: RegisterValue) -> FlushPlan
    {
        assert!(
            value.byte_size() <= info.size,
            "register write size mismatch: {} bytes into {} ({} bytes)",
            value.byte_size(),
            info.name,
            info.size
        );

        let staged = widen(info, value);
        {
            let bytes = bits::as_bytes_mut(&mut self.data);
            bytes[info.offset..info.offset + info.size].copy_from_slice(&staged[..info.size]);
        }

        if info.ty == RegisterType::Fpr {
            return FlushPlan::FprBlock;
        }

        // GPR and DR slots are poked as whole 8-byte words, so realign.
        // This is also what makes the odd-offset ah/bh/ch/dh aliases land
        // inside their enclosing register's word.
        let aligned_offset = info.offset & !0b111;
        let bytes = bits::as_bytes(&self.data);
        let word = bits::from_bytes::<u64>(&bytes[aligned_offset..]);

        FlushPlan::UserWord {
            offset: aligned_offset,
            word,
        }
    }

    /// Replace the GPR block after a kernel refresh.
    pub(crate) fn set_gprs(&mut self, gprs: libc::user_regs_struct)
    {
        self.data.regs = gprs;
    }

    /// Replace the FPR/SSE block after a kernel refresh.
    pub(crate) fn set_fprs(&mut self, fprs: libc::user_fpregs_struct)
    {
        self.data.i387 = fprs;
    }

    /// Store one freshly peeked debug register.
    pub(crate) fn set_debug_register(&mut self, index: usize, word: u64)
    {
        self.data.u_debugreg[index] = word;
    }

    /// The FPR/SSE block as staged in the buffer, for whole-block flushes.
    pub(crate) fn fprs(&self) -> libc::user_fpregs_struct
    {
        self.data.i387
    }
}

impl std::fmt::Debug for RegisterFile
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result
    {
        f.debug_struct("RegisterFile").finish_non_exhaustive()
    }
}

/// Widen `value` into a 16-byte staging buffer per the catalog format.
///
/// Floating-point values are converted to the register's floating format;
/// signed integers are sign-extended to the register's width when it is an
/// unsigned-integer register; everything else is a zero-padded byte copy.
fn widen(info: &RegisterInfo, value: RegisterValue) -> [u8; 16]
{
    let mut out = [0u8; 16];

    match value {
        RegisterValue::U8(v) => out[..1].copy_from_slice(&v.to_le_bytes()),
        RegisterValue::U16(v) => out[..2].copy_from_slice(&v.to_le_bytes()),
        RegisterValue::U32(v) => out[..4].copy_from_slice(&v.to_le_bytes()),
        RegisterValue::U64(v) => out[..8].copy_from_slice(&v.to_le_bytes()),
        RegisterValue::I8(v) => widen_signed(info, i64::from(v), 1, &mut out),
        RegisterValue::I16(v) => widen_signed(info, i64::from(v), 2, &mut out),
        RegisterValue::I32(v) => widen_signed(info, i64::from(v), 4, &mut out),
        RegisterValue::I64(v) => widen_signed(info, v, 8, &mut out),
        RegisterValue::F32(v) => match info.format {
            RegisterFormat::DoubleFloat => out[..8].copy_from_slice(&f64::from(v).to_le_bytes()),
            RegisterFormat::LongDouble => out[..10].copy_from_slice(&extended_from_f64(f64::from(v))),
            _ => out[..4].copy_from_slice(&v.to_le_bytes()),
        },
        RegisterValue::F64(v) => match info.format {
            RegisterFormat::LongDouble => out[..10].copy_from_slice(&extended_from_f64(v)),
            _ => out[..8].copy_from_slice(&v.to_le_bytes()),
        },
        RegisterValue::F80(bytes) => out[..10].copy_from_slice(&bytes),
        RegisterValue::Byte64(bytes) => out[..8].copy_from_slice(&bytes),
        RegisterValue::Byte128(bytes) => out.copy_from_slice(&bytes),
    }

    out
}

/// Sign-extend a signed integer to the register's width for `Uint`
/// registers; otherwise copy its natural width.
fn widen_signed(info: &RegisterInfo, value: i64, natural_size: usize, out: &mut [u8; 16])
{
    let width = if info.format == RegisterFormat::Uint {
        info.size.min(8)
    } else {
        natural_size
    };
    out[..width].copy_from_slice(&value.to_le_bytes()[..width]);
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::registers::info::register_info_by_name;

    fn file() -> RegisterFile
    {
        RegisterFile::new()
    }

    fn read_u64(file: &RegisterFile, name: &str) -> u64
    {
        match file.read(register_info_by_name(name).unwrap()).unwrap() {
            RegisterValue::U64(v) => v,
            other => panic!("expected U64, got {other:?}"),
        }
    }

    #[test]
    fn u64_write_round_trips_through_rax()
    {
        let mut regs = file();
        let rax = register_info_by_name("rax").unwrap();

        let plan = regs.stage_write(rax, RegisterValue::U64(0x1122_3344_5566_7788));
        assert_eq!(read_u64(&regs, "rax"), 0x1122_3344_5566_7788);

        match plan {
            FlushPlan::UserWord { offset, word } => {
                assert_eq!(offset, rax.offset);
                assert_eq!(word, 0x1122_3344_5566_7788);
            }
            FlushPlan::FprBlock => panic!("GPR write must flush a user word"),
        }
    }

    #[test]
    fn low_byte_write_touches_only_the_low_byte()
    {
        let mut regs = file();
        let rax = register_info_by_name("rax").unwrap();
        let al = register_info_by_name("al").unwrap();

        regs.stage_write(rax, RegisterValue::U64(0));
        let plan = regs.stage_write(al, RegisterValue::U8(0xAA));

        assert_eq!(read_u64(&regs, "rax"), 0xAA);
        assert_eq!(
            plan,
            FlushPlan::UserWord {
                offset: rax.offset,
                word: 0xAA
            }
        );
    }

    #[test]
    fn high_byte_alias_realigns_to_the_enclosing_word()
    {
        let mut regs = file();
        let rbx = register_info_by_name("rbx").unwrap();
        let bh = register_info_by_name("bh").unwrap();

        regs.stage_write(rbx, RegisterValue::U64(0));
        let plan = regs.stage_write(bh, RegisterValue::U8(0xCD));

        assert_eq!(bh.offset, rbx.offset + 1);
        assert_eq!(read_u64(&regs, "rbx"), 0xCD00);
        assert_eq!(
            plan,
            FlushPlan::UserWord {
                offset: rbx.offset,
                word: 0xCD00
            }
        );
    }

    #[test]
    fn signed_writes_sign_extend_to_register_width()
    {
        let mut regs = file();
        let rax = register_info_by_name("rax").unwrap();

        regs.stage_write(rax, RegisterValue::I8(-1));
        assert_eq!(read_u64(&regs, "rax"), u64::MAX);

        regs.stage_write(rax, RegisterValue::I32(-2));
        assert_eq!(read_u64(&regs, "rax"), 0xFFFF_FFFF_FFFF_FFFE);
    }

    #[test]
    fn unsigned_writes_zero_extend()
    {
        let mut regs = file();
        let rax = register_info_by_name("rax").unwrap();

        regs.stage_write(rax, RegisterValue::U64(u64::MAX));
        regs.stage_write(rax, RegisterValue::U16(0xBEEF));
        // Only the register's width is rewritten, staged from zero padding.
        assert_eq!(read_u64(&regs, "rax"), 0xBEEF);
    }

    #[test]
    fn double_write_to_st_register_widens_to_extended()
    {
        let mut regs = file();
        let st0 = register_info_by_name("st0").unwrap();

        let plan = regs.stage_write(st0, RegisterValue::F64(2.5));
        assert_eq!(plan, FlushPlan::FprBlock);

        match regs.read(st0).unwrap() {
            RegisterValue::F80(bytes) => {
                assert_eq!(crate::registers::value::extended_to_f64(bytes), 2.5);
            }
            other => panic!("expected F80, got {other:?}"),
        }
    }

    #[test]
    fn vector_write_round_trips_through_xmm()
    {
        let mut regs = file();
        let xmm0 = register_info_by_name("xmm0").unwrap();
        let pattern: [u8; 16] = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD,
            0xEE, 0xFF,
        ];

        let plan = regs.stage_write(xmm0, RegisterValue::Byte128(pattern));
        assert_eq!(plan, FlushPlan::FprBlock);
        assert_eq!(regs.read(xmm0).unwrap(), RegisterValue::Byte128(pattern));
    }

    #[test]
    fn mm_register_reads_as_byte64()
    {
        let mut regs = file();
        let mm1 = register_info_by_name("mm1").unwrap();
        let pattern = [1u8, 2, 3, 4, 5, 6, 7, 8];

        regs.stage_write(mm1, RegisterValue::Byte64(pattern));
        assert_eq!(regs.read(mm1).unwrap(), RegisterValue::Byte64(pattern));
    }

    #[test]
    fn debug_register_writes_flush_their_own_word()
    {
        let mut regs = file();
        let dr3 = register_info_by_name("dr3").unwrap();

        let plan = regs.stage_write(dr3, RegisterValue::U64(0xDEAD));
        assert_eq!(
            plan,
            FlushPlan::UserWord {
                offset: dr3.offset,
                word: 0xDEAD
            }
        );
    }

    #[test]
    #[should_panic(expected = "size mismatch")]
    fn oversized_write_panics()
    {
        let mut regs = file();
        let al = register_info_by_name("al").unwrap();
        regs.stage_write(al, RegisterValue::U64(1));
    }
}
