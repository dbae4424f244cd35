use super::core::Cpu;
use super::csr::{
    CSR_MEPC, CSR_MSTATUS, CSR_SEPC, CSR_SSTATUS, MASK_MIE, MASK_MPIE, MASK_MPP, MASK_MPRV,
    MASK_SIE, MASK_SPIE, MASK_SPP,
};
use super::types::{Mode, Trap};
use crate::bus::Bus;
use crate::decoder::{Instruction, Op};

impl Cpu {
    /// Apply the semantics of `op` and commit the next pc.
    pub(super) fn execute(&mut self, inst: &Instruction, op: Op) -> Result<(), Trap> {
        let pc = self.pc;
        let mut next_pc = pc.wrapping_add(4);

        let rd = inst.rd;
        let rs1 = self.regs.read(inst.rs1);
        let rs2 = self.regs.read(inst.rs2);

        match op {
            Op::Lb | Op::Lh | Op::Lw | Op::Ld | Op::Lbu | Op::Lhu | Op::Lwu => {
                let addr = rs1.wrapping_add(inst.imm_i);
                let val = match op {
                    Op::Lb => self.bus.read8(addr)? as i8 as i64 as u64,
                    Op::Lh => self.bus.read16(addr)? as i16 as i64 as u64,
                    Op::Lw => self.bus.read32(addr)? as i32 as i64 as u64,
                    Op::Ld => self.bus.read64(addr)?,
                    Op::Lbu => self.bus.read8(addr)? as u64,
                    Op::Lhu => self.bus.read16(addr)? as u64,
                    _ => self.bus.read32(addr)? as u64, // LWU
                };
                self.regs.write(rd, val);
            }
            Op::Fence => {}

            Op::Addi => self.regs.write(rd, rs1.wrapping_add(inst.imm_i)),
            Op::Slli => self.regs.write(rd, rs1 << inst.shamt()),
            Op::Slti => self
                .regs
                .write(rd, ((rs1 as i64) < (inst.imm_i as i64)) as u64),
            Op::Sltiu => self.regs.write(rd, (rs1 < inst.imm_i) as u64),
            Op::Xori => self.regs.write(rd, rs1 ^ inst.imm_i),
            Op::Srli => self.regs.write(rd, rs1 >> inst.shamt()),
            Op::Srai => self
                .regs
                .write(rd, ((rs1 as i64) >> inst.shamt()) as u64),
            Op::Ori => self.regs.write(rd, rs1 | inst.imm_i),
            Op::Andi => self.regs.write(rd, rs1 & inst.imm_i),
            Op::Auipc => self.regs.write(rd, pc.wrapping_add(inst.imm_u)),

            Op::Addiw => self.regs.write(rd, sext32(rs1.wrapping_add(inst.imm_i) as u32)),
            Op::Slliw => self.regs.write(rd, sext32((rs1 as u32) << inst.rs2)),
            Op::Srliw => self.regs.write(rd, sext32((rs1 as u32) >> inst.rs2)),
            Op::Sraiw => self
                .regs
                .write(rd, ((rs1 as i32) >> inst.rs2) as i64 as u64),

            Op::Sb | Op::Sh | Op::Sw | Op::Sd => {
                let addr = rs1.wrapping_add(inst.imm_s);
                match op {
                    Op::Sb => self.bus.write8(addr, rs2 as u8)?,
                    Op::Sh => self.bus.write16(addr, rs2 as u16)?,
                    Op::Sw => self.bus.write32(addr, rs2 as u32)?,
                    _ => self.bus.write64(addr, rs2)?, // SD
                }
            }

            Op::Add => self.regs.write(rd, rs1.wrapping_add(rs2)),
            Op::Sub => self.regs.write(rd, rs1.wrapping_sub(rs2)),
            Op::Mul => self.regs.write(rd, rs1.wrapping_mul(rs2)),
            Op::Sll => self.regs.write(rd, rs1 << (rs2 & 0x3F)),
            Op::Slt => self.regs.write(rd, ((rs1 as i64) < (rs2 as i64)) as u64),
            Op::Sltu => self.regs.write(rd, (rs1 < rs2) as u64),
            Op::Xor => self.regs.write(rd, rs1 ^ rs2),
            Op::Srl => self.regs.write(rd, rs1 >> (rs2 & 0x3F)),
            Op::Sra => self
                .regs
                .write(rd, ((rs1 as i64) >> (rs2 & 0x3F)) as u64),
            Op::Or => self.regs.write(rd, rs1 | rs2),
            Op::And => self.regs.write(rd, rs1 & rs2),
            Op::Lui => self.regs.write(rd, inst.imm_u),

            Op::Addw => self.regs.write(rd, sext32(rs1.wrapping_add(rs2) as u32)),
            Op::Subw => self.regs.write(rd, sext32(rs1.wrapping_sub(rs2) as u32)),
            Op::Sllw => self.regs.write(rd, sext32((rs1 as u32) << (rs2 & 0x1F))),
            Op::Srlw => self.regs.write(rd, sext32((rs1 as u32) >> (rs2 & 0x1F))),
            Op::Sraw => self
                .regs
                .write(rd, ((rs1 as i32) >> (rs2 & 0x1F)) as i64 as u64),
            Op::Divuw => {
                let (a, b) = (rs1 as u32, rs2 as u32);
                // Division by zero yields all ones rather than a fault.
                let val = if b == 0 { u64::MAX } else { sext32(a / b) };
                self.regs.write(rd, val);
            }
            Op::Remuw => {
                let (a, b) = (rs1 as u32, rs2 as u32);
                let val = if b == 0 { sext32(a) } else { sext32(a % b) };
                self.regs.write(rd, val);
            }

            Op::Beq | Op::Bne | Op::Blt | Op::Bge | Op::Bltu | Op::Bgeu => {
                let taken = match op {
                    Op::Beq => rs1 == rs2,
                    Op::Bne => rs1 != rs2,
                    Op::Blt => (rs1 as i64) < (rs2 as i64),
                    Op::Bge => (rs1 as i64) >= (rs2 as i64),
                    Op::Bltu => rs1 < rs2,
                    _ => rs1 >= rs2, // BGEU
                };
                if taken {
                    next_pc = pc.wrapping_add(inst.imm_b);
                }
            }
            Op::Jalr => {
                // Target uses rs1 before the link write, since rd may equal rs1.
                next_pc = rs1.wrapping_add(inst.imm_i) & !1;
                self.regs.write(rd, pc.wrapping_add(4));
            }
            Op::Jal => {
                self.regs.write(rd, pc.wrapping_add(4));
                next_pc = pc.wrapping_add(inst.imm_j);
            }

            Op::Sret => next_pc = self.sret()?,
            Op::Mret => next_pc = self.mret()?,
            // No address translation, so there is nothing to flush.
            Op::SfenceVma => {}

            Op::Csrrw | Op::Csrrs | Op::Csrrc | Op::Csrrwi | Op::Csrrsi | Op::Csrrci => {
                self.exec_csr(inst, op, rs1)?;
            }
        }

        self.pc = next_pc;
        Ok(())
    }

    /// `old = csr; csr = f(old, src); rd = old`. The set/clear forms leave the
    /// CSR untouched when the source field is zero.
    fn exec_csr(&mut self, inst: &Instruction, op: Op, rs1: u64) -> Result<(), Trap> {
        let addr = inst.csr;
        let old = self.read_csr(addr)?;
        let src = match op {
            Op::Csrrwi | Op::Csrrsi | Op::Csrrci => inst.rs1 as u64, // zimm
            _ => rs1,
        };
        let new = match op {
            Op::Csrrw | Op::Csrrwi => Some(src),
            Op::Csrrs | Op::Csrrsi => (inst.rs1 != 0).then_some(old | src),
            _ => (inst.rs1 != 0).then_some(old & !src),
        };
        if let Some(val) = new {
            self.write_csr(addr, val)?;
        }
        self.regs.write(inst.rd, old);
        Ok(())
    }

    fn mret(&mut self) -> Result<u64, Trap> {
        let mut mstatus = self.read_csr(CSR_MSTATUS)?;
        let prev = Mode::from_mpp((mstatus & MASK_MPP) >> 11);

        if mstatus & MASK_MPIE != 0 {
            mstatus |= MASK_MIE;
        } else {
            mstatus &= !MASK_MIE;
        }
        mstatus |= MASK_MPIE;
        mstatus &= !(MASK_MPP | MASK_MPRV);
        self.write_csr(CSR_MSTATUS, mstatus)?;

        let target = self.read_csr(CSR_MEPC)? & !3;
        log::debug!("mret: {:?} -> {:?}, pc={:#x}", self.mode, prev, target);
        self.mode = prev;
        Ok(target)
    }

    fn sret(&mut self) -> Result<u64, Trap> {
        let mut sstatus = self.read_csr(CSR_SSTATUS)?;
        let prev = if sstatus & MASK_SPP != 0 {
            Mode::Supervisor
        } else {
            Mode::User
        };

        if sstatus & MASK_SPIE != 0 {
            sstatus |= MASK_SIE;
        } else {
            sstatus &= !MASK_SIE;
        }
        sstatus |= MASK_SPIE;
        sstatus &= !MASK_SPP;
        self.write_csr(CSR_SSTATUS, sstatus)?;

        let target = self.read_csr(CSR_SEPC)? & !3;
        log::debug!("sret: {:?} -> {:?}, pc={:#x}", self.mode, prev, target);
        self.mode = prev;
        Ok(target)
    }
}

/// Sign-extend a 32-bit result to 64 bits.
#[inline]
fn sext32(val: u32) -> u64 {
    val as i32 as i64 as u64
}

#[cfg(test)]
mod tests {
    use crate::config::{KERNEL_BASE, UART_BASE};
    use crate::cpu::core::tests::make_cpu;
    use crate::cpu::csr::{CSR_MSTATUS, CSR_MTVEC, CSR_SATP, CSR_SSTATUS, MASK_SIE, MASK_MIE};
    use crate::cpu::Trap;
    use crate::bus::Bus;
    use crate::decoder::encode;

    const BASE: u64 = KERNEL_BASE;

    #[test]
    fn test_addi_sign_extends_immediate() {
        for imm in [-2048, -1, 0, 1, 0x7FF] {
            let (mut cpu, _) = make_cpu(&[encode::i(imm, 1, 0, 2, 0x13)]);
            cpu.write_reg(1, 0x1234);
            cpu.step().unwrap();
            assert_eq!(cpu.read_reg(2), 0x1234u64.wrapping_add(imm as i64 as u64));
            assert_eq!(cpu.pc, BASE + 4);
        }
    }

    #[test]
    fn test_lui_and_auipc() {
        let (mut cpu, _) = make_cpu(&[
            encode::u(0x12345 << 12, 2, 0x37),   // lui x2, 0x12345
            encode::u(0xFFFFF << 12, 3, 0x17),   // auipc x3, -1 page
        ]);
        cpu.step().unwrap();
        assert_eq!(cpu.read_reg(2), 0x0000_0000_1234_5000);
        cpu.step().unwrap();
        assert_eq!(cpu.read_reg(3), BASE + 4 - 0x1000);
    }

    #[test]
    fn test_load_store() {
        let (mut cpu, _) = make_cpu(&[
            encode::s(0x100, 1, 2, 3, 0x23), // sd x1, 0x100(x2)
            encode::i(0x100, 2, 3, 3, 0x03), // ld x3, 0x100(x2)
            encode::s(0x108, 1, 2, 2, 0x23), // sw x1, 0x108(x2)
            encode::i(0x108, 2, 2, 4, 0x03), // lw x4, 0x108(x2)
            encode::i(0x108, 2, 6, 5, 0x03), // lwu x5, 0x108(x2)
            encode::i(0x10B, 2, 0, 6, 0x03), // lb x6, 0x10b(x2)
            encode::i(0x10B, 2, 4, 7, 0x03), // lbu x7, 0x10b(x2)
            encode::i(0x10A, 2, 1, 8, 0x03), // lh x8, 0x10a(x2)
            encode::i(0x10A, 2, 5, 9, 0x03), // lhu x9, 0x10a(x2)
            encode::s(0x110, 1, 2, 1, 0x23), // sh x1, 0x110(x2)
            encode::s(0x113, 1, 2, 0, 0x23), // sb x1, 0x113(x2)
            encode::i(0x110, 2, 3, 10, 0x03), // ld x10, 0x110(x2)
        ]);
        cpu.write_reg(1, 0xDEAD_BEEF_8765_4321);
        cpu.write_reg(2, BASE);
        for _ in 0..12 {
            cpu.step().unwrap();
        }
        assert_eq!(cpu.bus.read64(BASE + 0x100).unwrap(), 0xDEAD_BEEF_8765_4321);
        assert_eq!(cpu.read_reg(3), 0xDEAD_BEEF_8765_4321);
        assert_eq!(cpu.read_reg(4), 0xFFFF_FFFF_8765_4321);
        assert_eq!(cpu.read_reg(5), 0x8765_4321);
        assert_eq!(cpu.read_reg(6), 0xFFFF_FFFF_FFFF_FF87);
        assert_eq!(cpu.read_reg(7), 0x87);
        assert_eq!(cpu.read_reg(8), 0xFFFF_FFFF_FFFF_8765);
        assert_eq!(cpu.read_reg(9), 0x8765);
        // sh and sb write only their low bytes.
        assert_eq!(cpu.bus.read16(BASE + 0x110).unwrap(), 0x4321);
        assert_eq!(cpu.bus.read8(BASE + 0x113).unwrap(), 0x21);
        assert_eq!(cpu.read_reg(10), 0x2100_4321);
    }

    #[test]
    fn test_x0_invariant() {
        let (mut cpu, _) = make_cpu(&[
            encode::i(5, 0, 0, 0, 0x13), // addi x0, x0, 5
            encode::i(0, 2, 3, 0, 0x03), // ld x0, 0(x2)
        ]);
        cpu.bus.write64(BASE + 0x100, 0xDEAD_BEEF).unwrap();
        cpu.write_reg(2, BASE + 0x100);
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.read_reg(0), 0);
    }

    #[test]
    fn test_branch_offset_law() {
        // (funct3, rs1, rs2, taken)
        let cases: [(u32, u64, u64, bool); 12] = [
            (0, 5, 5, true),
            (0, 5, 6, false),
            (1, 5, 6, true),
            (1, 5, 5, false),
            (4, u64::MAX, 0, true), // -1 < 0
            (4, 0, u64::MAX, false),
            (5, 0, u64::MAX, true),
            (5, u64::MAX, 0, false),
            (6, 0, u64::MAX, true),
            (6, u64::MAX, 0, false),
            (7, u64::MAX, 0, true),
            (7, 0, u64::MAX, false),
        ];
        for (funct3, a, b, taken) in cases {
            for offset in [8i32, -4] {
                let (mut cpu, _) = make_cpu(&[0x13, encode::b(offset, 2, 1, funct3, 0x63)]);
                cpu.pc = BASE + 4;
                cpu.write_reg(1, a);
                cpu.write_reg(2, b);
                cpu.step().unwrap();
                let expected = if taken {
                    (BASE + 4).wrapping_add(offset as i64 as u64)
                } else {
                    BASE + 8
                };
                assert_eq!(cpu.pc, expected, "funct3={} a={:#x} b={:#x}", funct3, a, b);
            }
        }
    }

    #[test]
    fn test_jal_and_jalr() {
        let (mut cpu, _) = make_cpu(&[
            encode::j(8, 1),                 // jal ra, +8
            0x13,                            // skipped
            encode::i(3, 1, 0, 1, 0x67),     // jalr ra, 3(ra)
        ]);
        cpu.step().unwrap();
        assert_eq!(cpu.read_reg(1), BASE + 4);
        assert_eq!(cpu.pc, BASE + 8);

        // rd == rs1: target uses the old value and clears bit 0.
        cpu.step().unwrap();
        assert_eq!(cpu.pc, BASE + 6);
        assert_eq!(cpu.read_reg(1), BASE + 12);
    }

    #[test]
    fn test_w_ops_sign_extension() {
        let (mut cpu, _) = make_cpu(&[
            encode::i(1, 1, 0, 2, 0x1B),           // addiw x2, x1, 1
            encode::i(4, 1, 1, 3, 0x1B),           // slliw x3, x1, 4
            encode::i(4, 1, 5, 4, 0x1B),           // srliw x4, x1, 4
            encode::i(0x400 | 4, 1, 5, 5, 0x1B),   // sraiw x5, x1, 4
            encode::r(0x20, 1, 0, 0, 6, 0x3B),     // subw x6, x0, x1
            encode::r(0, 7, 1, 1, 8, 0x3B),        // sllw x8, x1, x7
            encode::r(0x20, 7, 1, 5, 9, 0x3B),     // sraw x9, x1, x7
            encode::r(0, 1, 1, 0, 10, 0x3B),       // addw x10, x1, x1
        ]);
        cpu.write_reg(1, 0x0000_0000_7FFF_FFFF);
        cpu.write_reg(7, 33); // only the low five bits count
        for _ in 0..8 {
            cpu.step().unwrap();
        }
        assert_eq!(cpu.read_reg(2), 0xFFFF_FFFF_8000_0000);
        assert_eq!(cpu.read_reg(3), 0xFFFF_FFFF_FFFF_FFF0);
        assert_eq!(cpu.read_reg(4), 0x07FF_FFFF);
        assert_eq!(cpu.read_reg(5), 0x07FF_FFFF);
        assert_eq!(cpu.read_reg(6), 0xFFFF_FFFF_8000_0001);
        assert_eq!(cpu.read_reg(8), 0xFFFF_FFFF_FFFF_FFFE);
        assert_eq!(cpu.read_reg(9), 0x3FFF_FFFF);
        assert_eq!(cpu.read_reg(10), 0xFFFF_FFFF_FFFF_FFFE);
    }

    #[test]
    fn test_register_alu() {
        let (mut cpu, _) = make_cpu(&[
            encode::r(0, 2, 1, 0, 3, 0x33),    // add
            encode::r(0x20, 2, 1, 0, 4, 0x33), // sub
            encode::r(1, 2, 1, 0, 5, 0x33),    // mul
            encode::r(0, 2, 1, 2, 6, 0x33),    // slt
            encode::r(0, 2, 1, 3, 7, 0x33),    // sltu
            encode::r(0, 8, 1, 5, 9, 0x33),    // srl by x8
            encode::r(0x20, 8, 1, 5, 10, 0x33), // sra by x8
            encode::r(0, 8, 2, 1, 11, 0x33),   // sll by x8
            encode::r(0, 8, 1, 4, 12, 0x33),  // xor
            encode::r(0, 8, 1, 6, 13, 0x33),  // or
            encode::r(0, 8, 1, 7, 14, 0x33),  // and
        ]);
        cpu.write_reg(1, (-6i64) as u64);
        cpu.write_reg(2, 4);
        cpu.write_reg(8, 64 + 60); // masked to 60
        for _ in 0..11 {
            cpu.step().unwrap();
        }
        assert_eq!(cpu.read_reg(3) as i64, -2);
        assert_eq!(cpu.read_reg(4) as i64, -10);
        assert_eq!(cpu.read_reg(5) as i64, -24);
        assert_eq!(cpu.read_reg(6), 1);
        assert_eq!(cpu.read_reg(7), 0);
        assert_eq!(cpu.read_reg(9), 0xF);
        assert_eq!(cpu.read_reg(10), u64::MAX);
        assert_eq!(cpu.read_reg(11), 4 << 60);
        // 0x..fa against 0x7c
        assert_eq!(cpu.read_reg(12), 0xFFFF_FFFF_FFFF_FF86);
        assert_eq!(cpu.read_reg(13), 0xFFFF_FFFF_FFFF_FFFE);
        assert_eq!(cpu.read_reg(14), 0x78);
    }

    #[test]
    fn test_immediate_compares_and_shifts() {
        let (mut cpu, _) = make_cpu(&[
            encode::i(-1, 1, 2, 2, 0x13),         // slti x2, x1, -1
            encode::i(-1, 1, 3, 3, 0x13),         // sltiu x3, x1, -1
            encode::i(32, 4, 1, 5, 0x13),         // slli x5, x4, 32
            encode::i(63, 6, 5, 7, 0x13),         // srli x7, x6, 63
            encode::i(0x400 | 63, 6, 5, 8, 0x13), // srai x8, x6, 63
            encode::i(0x0F0, 4, 4, 9, 0x13),      // xori x9, x4, 0xf0
            encode::i(0x700, 4, 6, 10, 0x13),     // ori x10, x4, 0x700
            encode::i(-16, 4, 7, 11, 0x13),       // andi x11, x4, -16
            encode::i(-1, 4, 4, 12, 0x13),        // xori x12, x4, -1
        ]);
        cpu.write_reg(1, (-2i64) as u64);
        cpu.write_reg(4, 0xFF);
        cpu.write_reg(6, 1 << 63);
        for _ in 0..9 {
            cpu.step().unwrap();
        }
        assert_eq!(cpu.read_reg(2), 1); // -2 < -1
        assert_eq!(cpu.read_reg(3), 1); // 0xff..fe < 0xff..ff
        assert_eq!(cpu.read_reg(5), 0xFF << 32);
        assert_eq!(cpu.read_reg(7), 1);
        assert_eq!(cpu.read_reg(8), u64::MAX);
        assert_eq!(cpu.read_reg(9), 0x0F);
        assert_eq!(cpu.read_reg(10), 0x7FF);
        assert_eq!(cpu.read_reg(11), 0xF0);
        assert_eq!(cpu.read_reg(12), !0xFFu64);
    }

    #[test]
    fn test_unsigned_word_division_by_zero() {
        let (mut cpu, _) = make_cpu(&[
            encode::r(1, 0, 1, 5, 2, 0x3B), // divuw x2, x1, x0
            encode::r(1, 0, 1, 7, 3, 0x3B), // remuw x3, x1, x0
            encode::r(1, 4, 1, 5, 5, 0x3B), // divuw x5, x1, x4
            encode::r(1, 4, 1, 7, 6, 0x3B), // remuw x6, x1, x4
        ]);
        cpu.write_reg(1, 0x1234_5678_9ABC_DEF1);
        cpu.write_reg(4, 0x10);
        for _ in 0..4 {
            cpu.step().unwrap();
        }
        assert_eq!(cpu.read_reg(2), 0xFFFF_FFFF_FFFF_FFFF);
        assert_eq!(cpu.read_reg(3), 0xFFFF_FFFF_9ABC_DEF1);
        assert_eq!(cpu.read_reg(5), 0x09AB_CDEF);
        assert_eq!(cpu.read_reg(6), 0x1);
    }

    #[test]
    fn test_zicsr_basic_csrs() {
        let (mut cpu, _) = make_cpu(&[
            encode::csr(CSR_MSTATUS, 5, 5, 1),   // csrrwi x1, mstatus, 5
            encode::csr(CSR_MSTATUS, 0xA, 6, 2), // csrrsi x2, mstatus, 0xa
            encode::csr(CSR_MSTATUS, 0x3, 7, 3), // csrrci x3, mstatus, 3
            encode::csr(CSR_MSTATUS, 0, 2, 4),   // csrrs x4, mstatus, x0
            encode::csr(CSR_MTVEC, 5, 1, 6),     // csrrw x6, mtvec, x5
            encode::csr(CSR_SATP, 5, 3, 7),      // csrrc x7, satp, x5
        ]);
        cpu.write_reg(5, 0x8000_0100);
        for _ in 0..6 {
            cpu.step().unwrap();
        }
        assert_eq!(cpu.read_reg(1), 0);
        assert_eq!(cpu.read_reg(2), 5);
        assert_eq!(cpu.read_reg(3), 0xF);
        assert_eq!(cpu.read_reg(4), 0xC);
        assert_eq!(cpu.read_csr(CSR_MSTATUS).unwrap(), 0xC);
        assert_eq!(cpu.read_reg(6), 0);
        assert_eq!(cpu.read_csr(CSR_MTVEC).unwrap(), 0x8000_0100);
        assert_eq!(cpu.read_reg(7), 0);
    }

    #[test]
    fn test_sstatus_write_reaches_mstatus() {
        let (mut cpu, _) = make_cpu(&[
            encode::csr(CSR_SSTATUS, 5, 1, 0), // csrrw x0, sstatus, x5
            encode::csr(CSR_MSTATUS, 0, 2, 6), // csrrs x6, mstatus, x0
        ]);
        cpu.write_csr(CSR_MSTATUS, MASK_MIE).unwrap();
        cpu.write_reg(5, MASK_SIE | MASK_MIE << 8);
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.read_reg(6), MASK_SIE | MASK_MIE);
    }

    #[test]
    fn test_console_store_through_cpu() {
        let (mut cpu, sink) = make_cpu(&[
            encode::i(b'A' as i32, 0, 0, 2, 0x13),  // addi x2, x0, 'A'
            encode::s(0, 2, 1, 0, 0x23),            // sb x2, 0(x1)
            encode::i(b'\n' as i32, 0, 0, 2, 0x13), // addi x2, x0, '\n'
            encode::s(0, 2, 1, 0, 0x23),            // sb x2, 0(x1)
            encode::s(0, 2, 1, 2, 0x23),            // sw x2, 0(x1)
        ]);
        cpu.write_reg(1, UART_BASE);
        assert_eq!(cpu.run(), Err(Trap::InvalidAccessWidth(4)));
        assert_eq!(sink.contents(), b"A\n");
    }

    #[test]
    fn test_fence_and_sfence_are_no_ops() {
        let (mut cpu, _) = make_cpu(&[0x0FF0_000F, 0x0000_100F, 0x1200_0073]);
        assert_eq!(cpu.run(), Ok(3));
        assert_eq!(cpu.regs(), &{
            let mut r = [0u64; 32];
            r[2] = BASE + 1024 * 1024;
            r
        });
    }
}
