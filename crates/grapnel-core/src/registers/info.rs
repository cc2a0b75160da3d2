//! # Register Catalog
//!
//! The static table of x86-64 register descriptors.
//!
//! Every register the debugger can touch has one entry here: its name, its
//! DWARF register number (−1 when the debug-info format defines none), its
//! width in bytes, its byte offset into the kernel's per-process `user`
//! structure, its class, and how its bits are interpreted.
//!
//! ## Single source of truth
//!
//! The whole catalog is generated from one declarative list inside
//! `define_registers!`; adding or removing a register means editing
//! exactly one line. Offsets are never written by hand — they are computed
//! with `memoffset` from the `libc::user`, `libc::user_regs_struct`, and
//! `libc::user_fpregs_struct` layouts, so the table matches what
//! `PTRACE_GETREGS` / `PTRACE_PEEKUSER` actually operate on byte-for-byte.
//!
//! ## Subregister aliases
//!
//! The 32/16/8-bit views of each GPR (`eax`, `ax`, `ah`, `al`, ...) are
//! their own catalog entries sharing the enclosing register's storage; the
//! high-byte aliases (`ah`..`dh`) sit one byte into it, which is why user
//! area pokes must realign to 8-byte words (see the register file).

use memoffset::offset_of;
use once_cell::sync::Lazy;
use paste::paste;

use crate::error::{GrapnelError, Result};

/// Class of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterType
{
    /// General-purpose register
    Gpr,
    /// Subregister alias of a GPR (e.g. `eax` for the low half of `rax`)
    SubGpr,
    /// Floating-point register (x87, MMX, and SSE state)
    Fpr,
    /// Hardware debug register
    Dr,
}

/// How the bits of a register are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterFormat
{
    /// Unsigned integer of the register's width
    Uint,
    /// IEEE 754 binary64
    DoubleFloat,
    /// 80-bit x87 extended precision (stored padded within 16 bytes)
    LongDouble,
    /// Opaque byte vector
    Vector,
}

/// Immutable descriptor for one register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterInfo
{
    /// Catalog identity of this register.
    pub id: RegisterId,
    /// Lowercase register name as the front-end spells it (`"rax"`, `"ah"`, `"xmm3"`).
    pub name: &'static str,
    /// DWARF register number, or −1 when no mapping exists.
    pub dwarf_id: i32,
    /// Width in bytes.
    pub size: usize,
    /// Byte offset into the kernel's `user` structure.
    pub offset: usize,
    /// Register class.
    pub ty: RegisterType,
    /// Bit interpretation.
    pub format: RegisterFormat,
}

/// Offset of a GPR field inside the `user` structure.
macro_rules! gpr_offset {
    ($field:ident) => {
        offset_of!(libc::user, regs) + offset_of!(libc::user_regs_struct, $field)
    };
}

/// Offset of an FPR field inside the `user` structure (the i387 block).
macro_rules! fpr_offset {
    ($field:ident) => {
        offset_of!(libc::user, i387) + offset_of!(libc::user_fpregs_struct, $field)
    };
}

/// Offset of x87 stack register `n`. The MMX aliases share these slots.
fn st_offset(n: usize) -> usize
{
    fpr_offset!(st_space) + n * 16
}

/// Offset of SSE register `n`.
fn xmm_offset(n: usize) -> usize
{
    fpr_offset!(xmm_space) + n * 16
}

/// Offset of hardware debug register `n`.
fn dr_offset(n: usize) -> usize
{
    offset_of!(libc::user, u_debugreg) + n * 8
}

/// Generates [`RegisterId`] and the catalog table from one declarative
/// list. Each row is `(name, dwarf_id, size, offset, type, format)`.
macro_rules! define_registers {
    ( $( ($name:ident, $dwarf:expr, $size:expr, $offset:expr, $ty:ident, $format:ident) ),* $(,)? ) => {
        paste! {
            /// Identifies one entry in the register catalog.
            ///
            /// Variant names are the CamelCase spellings of the register
            /// names (`rax` → `Rax`, `fs_base` → `FsBase`, ...).
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            #[allow(missing_docs)]
            pub enum RegisterId {
                $( [<$name:camel>], )*
            }
        }

        fn build_register_table() -> Vec<RegisterInfo>
        {
            paste! {
                vec![
                    $(
                        RegisterInfo {
                            id: RegisterId::[<$name:camel>],
                            name: stringify!($name),
                            dwarf_id: $dwarf,
                            size: $size,
                            offset: $offset,
                            ty: RegisterType::$ty,
                            format: RegisterFormat::$format,
                        },
                    )*
                ]
            }
        }
    };
}

define_registers! {
    // 64-bit general-purpose registers. DWARF numbers per the x86-64 psABI.
    (rax, 0, 8, gpr_offset!(rax), Gpr, Uint),
    (rdx, 1, 8, gpr_offset!(rdx), Gpr, Uint),
    (rcx, 2, 8, gpr_offset!(rcx), Gpr, Uint),
    (rbx, 3, 8, gpr_offset!(rbx), Gpr, Uint),
    (rsi, 4, 8, gpr_offset!(rsi), Gpr, Uint),
    (rdi, 5, 8, gpr_offset!(rdi), Gpr, Uint),
    (rbp, 6, 8, gpr_offset!(rbp), Gpr, Uint),
    (rsp, 7, 8, gpr_offset!(rsp), Gpr, Uint),
    (r8, 8, 8, gpr_offset!(r8), Gpr, Uint),
    (r9, 9, 8, gpr_offset!(r9), Gpr, Uint),
    (r10, 10, 8, gpr_offset!(r10), Gpr, Uint),
    (r11, 11, 8, gpr_offset!(r11), Gpr, Uint),
    (r12, 12, 8, gpr_offset!(r12), Gpr, Uint),
    (r13, 13, 8, gpr_offset!(r13), Gpr, Uint),
    (r14, 14, 8, gpr_offset!(r14), Gpr, Uint),
    (r15, 15, 8, gpr_offset!(r15), Gpr, Uint),
    (rip, 16, 8, gpr_offset!(rip), Gpr, Uint),
    (eflags, 49, 8, gpr_offset!(eflags), Gpr, Uint),
    (cs, 51, 8, gpr_offset!(cs), Gpr, Uint),
    (fs, 54, 8, gpr_offset!(fs), Gpr, Uint),
    (gs, 55, 8, gpr_offset!(gs), Gpr, Uint),
    (ss, 52, 8, gpr_offset!(ss), Gpr, Uint),
    (ds, 53, 8, gpr_offset!(ds), Gpr, Uint),
    (es, 50, 8, gpr_offset!(es), Gpr, Uint),
    // The kernel parks the pre-syscall rax here; no DWARF mapping.
    (orig_rax, -1, 8, gpr_offset!(orig_rax), Gpr, Uint),
    (fs_base, 58, 8, gpr_offset!(fs_base), Gpr, Uint),
    (gs_base, 59, 8, gpr_offset!(gs_base), Gpr, Uint),

    // 32-bit subregisters.
    (eax, -1, 4, gpr_offset!(rax), SubGpr, Uint),
    (edx, -1, 4, gpr_offset!(rdx), SubGpr, Uint),
    (ecx, -1, 4, gpr_offset!(rcx), SubGpr, Uint),
    (ebx, -1, 4, gpr_offset!(rbx), SubGpr, Uint),
    (esi, -1, 4, gpr_offset!(rsi), SubGpr, Uint),
    (edi, -1, 4, gpr_offset!(rdi), SubGpr, Uint),
    (ebp, -1, 4, gpr_offset!(rbp), SubGpr, Uint),
    (esp, -1, 4, gpr_offset!(rsp), SubGpr, Uint),
    (r8d, -1, 4, gpr_offset!(r8), SubGpr, Uint),
    (r9d, -1, 4, gpr_offset!(r9), SubGpr, Uint),
    (r10d, -1, 4, gpr_offset!(r10), SubGpr, Uint),
    (r11d, -1, 4, gpr_offset!(r11), SubGpr, Uint),
    (r12d, -1, 4, gpr_offset!(r12), SubGpr, Uint),
    (r13d, -1, 4, gpr_offset!(r13), SubGpr, Uint),
    (r14d, -1, 4, gpr_offset!(r14), SubGpr, Uint),
    (r15d, -1, 4, gpr_offset!(r15), SubGpr, Uint),

    // 16-bit subregisters.
    (ax, -1, 2, gpr_offset!(rax), SubGpr, Uint),
    (dx, -1, 2, gpr_offset!(rdx), SubGpr, Uint),
    (cx, -1, 2, gpr_offset!(rcx), SubGpr, Uint),
    (bx, -1, 2, gpr_offset!(rbx), SubGpr, Uint),
    (si, -1, 2, gpr_offset!(rsi), SubGpr, Uint),
    (di, -1, 2, gpr_offset!(rdi), SubGpr, Uint),
    (bp, -1, 2, gpr_offset!(rbp), SubGpr, Uint),
    (sp, -1, 2, gpr_offset!(rsp), SubGpr, Uint),
    (r8w, -1, 2, gpr_offset!(r8), SubGpr, Uint),
    (r9w, -1, 2, gpr_offset!(r9), SubGpr, Uint),
    (r10w, -1, 2, gpr_offset!(r10), SubGpr, Uint),
    (r11w, -1, 2, gpr_offset!(r11), SubGpr, Uint),
    (r12w, -1, 2, gpr_offset!(r12), SubGpr, Uint),
    (r13w, -1, 2, gpr_offset!(r13), SubGpr, Uint),
    (r14w, -1, 2, gpr_offset!(r14), SubGpr, Uint),
    (r15w, -1, 2, gpr_offset!(r15), SubGpr, Uint),

    // High 8-bit subregisters: one byte into the enclosing register.
    (ah, -1, 1, gpr_offset!(rax) + 1, SubGpr, Uint),
    (dh, -1, 1, gpr_offset!(rdx) + 1, SubGpr, Uint),
    (ch, -1, 1, gpr_offset!(rcx) + 1, SubGpr, Uint),
    (bh, -1, 1, gpr_offset!(rbx) + 1, SubGpr, Uint),

    // Low 8-bit subregisters.
    (al, -1, 1, gpr_offset!(rax), SubGpr, Uint),
    (dl, -1, 1, gpr_offset!(rdx), SubGpr, Uint),
    (cl, -1, 1, gpr_offset!(rcx), SubGpr, Uint),
    (bl, -1, 1, gpr_offset!(rbx), SubGpr, Uint),
    (sil, -1, 1, gpr_offset!(rsi), SubGpr, Uint),
    (dil, -1, 1, gpr_offset!(rdi), SubGpr, Uint),
    (bpl, -1, 1, gpr_offset!(rbp), SubGpr, Uint),
    (spl, -1, 1, gpr_offset!(rsp), SubGpr, Uint),
    (r8b, -1, 1, gpr_offset!(r8), SubGpr, Uint),
    (r9b, -1, 1, gpr_offset!(r9), SubGpr, Uint),
    (r10b, -1, 1, gpr_offset!(r10), SubGpr, Uint),
    (r11b, -1, 1, gpr_offset!(r11), SubGpr, Uint),
    (r12b, -1, 1, gpr_offset!(r12), SubGpr, Uint),
    (r13b, -1, 1, gpr_offset!(r13), SubGpr, Uint),
    (r14b, -1, 1, gpr_offset!(r14), SubGpr, Uint),
    (r15b, -1, 1, gpr_offset!(r15), SubGpr, Uint),

    // x87/SSE control and status state.
    (fcw, 65, 2, fpr_offset!(cwd), Fpr, Uint),
    (fsw, 66, 2, fpr_offset!(swd), Fpr, Uint),
    (ftw, -1, 2, fpr_offset!(ftw), Fpr, Uint),
    (fop, -1, 2, fpr_offset!(fop), Fpr, Uint),
    (frip, -1, 8, fpr_offset!(rip), Fpr, Uint),
    (frdp, -1, 8, fpr_offset!(rdp), Fpr, Uint),
    (mxcsr, 64, 4, fpr_offset!(mxcsr), Fpr, Uint),
    (mxcsrmask, -1, 4, fpr_offset!(mxcr_mask), Fpr, Uint),

    // x87 stack registers: 80-bit values padded to 16 bytes each.
    (st0, 33, 16, st_offset(0), Fpr, LongDouble),
    (st1, 34, 16, st_offset(1), Fpr, LongDouble),
    (st2, 35, 16, st_offset(2), Fpr, LongDouble),
    (st3, 36, 16, st_offset(3), Fpr, LongDouble),
    (st4, 37, 16, st_offset(4), Fpr, LongDouble),
    (st5, 38, 16, st_offset(5), Fpr, LongDouble),
    (st6, 39, 16, st_offset(6), Fpr, LongDouble),
    (st7, 40, 16, st_offset(7), Fpr, LongDouble),

    // MMX registers alias the low 8 bytes of the x87 stack slots.
    (mm0, 41, 8, st_offset(0), Fpr, Vector),
    (mm1, 42, 8, st_offset(1), Fpr, Vector),
    (mm2, 43, 8, st_offset(2), Fpr, Vector),
    (mm3, 44, 8, st_offset(3), Fpr, Vector),
    (mm4, 45, 8, st_offset(4), Fpr, Vector),
    (mm5, 46, 8, st_offset(5), Fpr, Vector),
    (mm6, 47, 8, st_offset(6), Fpr, Vector),
    (mm7, 48, 8, st_offset(7), Fpr, Vector),

    // SSE registers.
    (xmm0, 17, 16, xmm_offset(0), Fpr, Vector),
    (xmm1, 18, 16, xmm_offset(1), Fpr, Vector),
    (xmm2, 19, 16, xmm_offset(2), Fpr, Vector),
    (xmm3, 20, 16, xmm_offset(3), Fpr, Vector),
    (xmm4, 21, 16, xmm_offset(4), Fpr, Vector),
    (xmm5, 22, 16, xmm_offset(5), Fpr, Vector),
    (xmm6, 23, 16, xmm_offset(6), Fpr, Vector),
    (xmm7, 24, 16, xmm_offset(7), Fpr, Vector),
    (xmm8, 25, 16, xmm_offset(8), Fpr, Vector),
    (xmm9, 26, 16, xmm_offset(9), Fpr, Vector),
    (xmm10, 27, 16, xmm_offset(10), Fpr, Vector),
    (xmm11, 28, 16, xmm_offset(11), Fpr, Vector),
    (xmm12, 29, 16, xmm_offset(12), Fpr, Vector),
    (xmm13, 30, 16, xmm_offset(13), Fpr, Vector),
    (xmm14, 31, 16, xmm_offset(14), Fpr, Vector),
    (xmm15, 32, 16, xmm_offset(15), Fpr, Vector),

    // Hardware debug registers. Not addressable as a block; fetched and
    // flushed one user-area word at a time.
    (dr0, -1, 8, dr_offset(0), Dr, Uint),
    (dr1, -1, 8, dr_offset(1), Dr, Uint),
    (dr2, -1, 8, dr_offset(2), Dr, Uint),
    (dr3, -1, 8, dr_offset(3), Dr, Uint),
    (dr4, -1, 8, dr_offset(4), Dr, Uint),
    (dr5, -1, 8, dr_offset(5), Dr, Uint),
    (dr6, -1, 8, dr_offset(6), Dr, Uint),
    (dr7, -1, 8, dr_offset(7), Dr, Uint),
}

/// The eight debug registers in index order, for the per-word refresh.
pub(crate) const DEBUG_REGISTER_IDS: [RegisterId; 8] = [
    RegisterId::Dr0,
    RegisterId::Dr1,
    RegisterId::Dr2,
    RegisterId::Dr3,
    RegisterId::Dr4,
    RegisterId::Dr5,
    RegisterId::Dr6,
    RegisterId::Dr7,
];

static REGISTER_INFOS: Lazy<Vec<RegisterInfo>> = Lazy::new(build_register_table);

/// The full, ordered register catalog.
///
/// The table is built once at first use and immutable for the process
/// lifetime.
#[must_use]
pub fn register_infos() -> &'static [RegisterInfo]
{
    &REGISTER_INFOS
}

/// Look up a catalog entry by its [`RegisterId`].
///
/// ## Errors
///
/// Fails with [`GrapnelError::RegisterLookup`] when the id has no entry
/// (cannot happen for ids produced by this crate, but the lookup reports
/// rather than panics).
pub fn register_info_by_id(id: RegisterId) -> Result<&'static RegisterInfo>
{
    register_infos()
        .iter()
        .find(|info| info.id == id)
        .ok_or_else(|| GrapnelError::RegisterLookup(format!("{id:?}")))
}

/// Look up a catalog entry by its lowercase name (`"rax"`, `"ah"`, `"xmm3"`).
///
/// ## Errors
///
/// Fails with [`GrapnelError::RegisterLookup`] when no register has that
/// name.
pub fn register_info_by_name(name: &str) -> Result<&'static RegisterInfo>
{
    register_infos()
        .iter()
        .find(|info| info.name == name)
        .ok_or_else(|| GrapnelError::RegisterLookup(name.to_string()))
}

/// Look up a catalog entry by its DWARF register number.
///
/// ## Errors
///
/// Fails with [`GrapnelError::RegisterLookup`] for negative numbers (−1
/// marks "no DWARF mapping" in the table and never matches) and for
/// numbers no entry carries.
pub fn register_info_by_dwarf(dwarf_id: i32) -> Result<&'static RegisterInfo>
{
    if dwarf_id < 0 {
        return Err(GrapnelError::RegisterLookup(format!("dwarf {dwarf_id}")));
    }

    register_infos()
        .iter()
        .find(|info| info.dwarf_id == dwarf_id)
        .ok_or_else(|| GrapnelError::RegisterLookup(format!("dwarf {dwarf_id}")))
}
