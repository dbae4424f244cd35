//! Instruction word decoding.
//!
//! [`Instruction::parse`] splits a 32-bit word into its fixed fields and all
//! immediate encodings; [`Instruction::op`] resolves the
//! `(opcode, funct3, funct7)` triple to an [`Op`].

use crate::cpu::Trap;

pub const OPCODE_LOAD: u8 = 0b000_0011;
pub const OPCODE_MISC_MEM: u8 = 0b000_1111;
pub const OPCODE_OP_IMM: u8 = 0b001_0011;
pub const OPCODE_AUIPC: u8 = 0b001_0111;
pub const OPCODE_OP_IMM_32: u8 = 0b001_1011;
pub const OPCODE_STORE: u8 = 0b010_0011;
pub const OPCODE_OP: u8 = 0b011_0011;
pub const OPCODE_LUI: u8 = 0b011_0111;
pub const OPCODE_OP_32: u8 = 0b011_1011;
pub const OPCODE_BRANCH: u8 = 0b110_0011;
pub const OPCODE_JALR: u8 = 0b110_0111;
pub const OPCODE_JAL: u8 = 0b110_1111;
pub const OPCODE_SYSTEM: u8 = 0b111_0011;

/// Every field a 32-bit instruction can carry. Not all fields are
/// meaningful for every format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub raw: u32,
    pub opcode: u8,
    pub rd: u8,
    pub funct3: u8,
    pub rs1: u8,
    pub rs2: u8,
    pub funct7: u8,
    pub csr: u16,
    pub imm_i: u64,
    pub imm_s: u64,
    pub imm_b: u64,
    pub imm_j: u64,
    pub imm_u: u64,
}

impl Instruction {
    pub fn parse(raw: u32) -> Self {
        // I-type: imm[11:0] = inst[31:20]
        let imm_i = ((raw as i32) >> 20) as i64 as u64;
        // S-type: imm[11:5|4:0] = inst[31:25|11:7]
        let imm_s = ((((raw as i32) >> 25) << 5) | ((raw >> 7) & 0x1F) as i32) as i64 as u64;
        // B-type: imm[12|10:5|4:1|11]
        let imm_b = {
            let bit31 = (raw >> 31) & 1;
            let bit30_25 = (raw >> 25) & 0x3F;
            let bit11_8 = (raw >> 8) & 0xF;
            let bit7 = (raw >> 7) & 1;
            let val = (bit31 << 12) | (bit7 << 11) | (bit30_25 << 5) | (bit11_8 << 1);
            // Sign extend from bit 12
            ((val as i32) << 19 >> 19) as i64 as u64
        };
        // J-type: imm[20|10:1|11|19:12]
        let imm_j = {
            let bit31 = (raw >> 31) & 1;
            let bit30_21 = (raw >> 21) & 0x3FF;
            let bit20 = (raw >> 20) & 1;
            let bit19_12 = (raw >> 12) & 0xFF;
            let val = (bit31 << 20) | (bit19_12 << 12) | (bit20 << 11) | (bit30_21 << 1);
            ((val as i32) << 11 >> 11) as i64 as u64
        };
        // U-type: imm[31:12], low 12 bits zero
        let imm_u = ((raw & 0xFFFF_F000) as i32) as i64 as u64;

        Self {
            raw,
            opcode: (raw & 0x7F) as u8,
            rd: ((raw >> 7) & 0x1F) as u8,
            funct3: ((raw >> 12) & 0x7) as u8,
            rs1: ((raw >> 15) & 0x1F) as u8,
            rs2: ((raw >> 20) & 0x1F) as u8,
            funct7: ((raw >> 25) & 0x7F) as u8,
            csr: ((raw >> 20) & 0xFFF) as u16,
            imm_i,
            imm_s,
            imm_b,
            imm_j,
            imm_u,
        }
    }

    /// 6-bit shift amount of the RV64 immediate shifts (`inst[25:20]`).
    pub fn shamt(&self) -> u32 {
        ((self.raw >> 20) & 0x3F) as u32
    }

    fn illegal(&self) -> Trap {
        Trap::IllegalInstruction(self.raw)
    }

    /// Resolve the instruction to an operation, or fail with the raw word.
    pub fn op(&self) -> Result<Op, Trap> {
        let op = match (self.opcode, self.funct3, self.funct7) {
            (OPCODE_LOAD, 0b000, _) => Op::Lb,
            (OPCODE_LOAD, 0b001, _) => Op::Lh,
            (OPCODE_LOAD, 0b010, _) => Op::Lw,
            (OPCODE_LOAD, 0b011, _) => Op::Ld,
            (OPCODE_LOAD, 0b100, _) => Op::Lbu,
            (OPCODE_LOAD, 0b101, _) => Op::Lhu,
            (OPCODE_LOAD, 0b110, _) => Op::Lwu,

            (OPCODE_MISC_MEM, 0b000 | 0b001, _) => Op::Fence,

            (OPCODE_OP_IMM, 0b000, _) => Op::Addi,
            // funct7[0] is shamt[5] on RV64, so only the upper six bits select.
            (OPCODE_OP_IMM, 0b001, f7) if f7 >> 1 == 0 => Op::Slli,
            (OPCODE_OP_IMM, 0b010, _) => Op::Slti,
            (OPCODE_OP_IMM, 0b011, _) => Op::Sltiu,
            (OPCODE_OP_IMM, 0b100, _) => Op::Xori,
            (OPCODE_OP_IMM, 0b101, f7) if f7 >> 1 == 0 => Op::Srli,
            (OPCODE_OP_IMM, 0b101, f7) if f7 >> 1 == 0b010_0000 >> 1 => Op::Srai,
            (OPCODE_OP_IMM, 0b110, _) => Op::Ori,
            (OPCODE_OP_IMM, 0b111, _) => Op::Andi,

            (OPCODE_AUIPC, _, _) => Op::Auipc,

            (OPCODE_OP_IMM_32, 0b000, _) => Op::Addiw,
            (OPCODE_OP_IMM_32, 0b001, 0b000_0000) => Op::Slliw,
            (OPCODE_OP_IMM_32, 0b101, 0b000_0000) => Op::Srliw,
            (OPCODE_OP_IMM_32, 0b101, 0b010_0000) => Op::Sraiw,

            (OPCODE_STORE, 0b000, _) => Op::Sb,
            (OPCODE_STORE, 0b001, _) => Op::Sh,
            (OPCODE_STORE, 0b010, _) => Op::Sw,
            (OPCODE_STORE, 0b011, _) => Op::Sd,

            (OPCODE_OP, 0b000, 0b000_0000) => Op::Add,
            (OPCODE_OP, 0b000, 0b010_0000) => Op::Sub,
            (OPCODE_OP, 0b000, 0b000_0001) => Op::Mul,
            (OPCODE_OP, 0b001, 0b000_0000) => Op::Sll,
            (OPCODE_OP, 0b010, 0b000_0000) => Op::Slt,
            (OPCODE_OP, 0b011, 0b000_0000) => Op::Sltu,
            (OPCODE_OP, 0b100, 0b000_0000) => Op::Xor,
            (OPCODE_OP, 0b101, 0b000_0000) => Op::Srl,
            (OPCODE_OP, 0b101, 0b010_0000) => Op::Sra,
            (OPCODE_OP, 0b110, 0b000_0000) => Op::Or,
            (OPCODE_OP, 0b111, 0b000_0000) => Op::And,

            (OPCODE_LUI, _, _) => Op::Lui,

            (OPCODE_OP_32, 0b000, 0b000_0000) => Op::Addw,
            (OPCODE_OP_32, 0b000, 0b010_0000) => Op::Subw,
            (OPCODE_OP_32, 0b001, 0b000_0000) => Op::Sllw,
            (OPCODE_OP_32, 0b101, 0b000_0000) => Op::Srlw,
            (OPCODE_OP_32, 0b101, 0b010_0000) => Op::Sraw,
            (OPCODE_OP_32, 0b101, 0b000_0001) => Op::Divuw,
            (OPCODE_OP_32, 0b111, 0b000_0001) => Op::Remuw,

            (OPCODE_BRANCH, 0b000, _) => Op::Beq,
            (OPCODE_BRANCH, 0b001, _) => Op::Bne,
            (OPCODE_BRANCH, 0b100, _) => Op::Blt,
            (OPCODE_BRANCH, 0b101, _) => Op::Bge,
            (OPCODE_BRANCH, 0b110, _) => Op::Bltu,
            (OPCODE_BRANCH, 0b111, _) => Op::Bgeu,

            (OPCODE_JALR, 0b000, _) => Op::Jalr,
            (OPCODE_JAL, _, _) => Op::Jal,

            // rs2 separates sret (0x10200073) from wfi (0x10500073).
            (OPCODE_SYSTEM, 0b000, 0b000_1000) if self.rs2 == 0b00010 => Op::Sret,
            (OPCODE_SYSTEM, 0b000, 0b001_1000) if self.rs2 == 0b00010 => Op::Mret,
            (OPCODE_SYSTEM, 0b000, 0b000_1001) => Op::SfenceVma,
            (OPCODE_SYSTEM, 0b001, _) => Op::Csrrw,
            (OPCODE_SYSTEM, 0b010, _) => Op::Csrrs,
            (OPCODE_SYSTEM, 0b011, _) => Op::Csrrc,
            (OPCODE_SYSTEM, 0b101, _) => Op::Csrrwi,
            (OPCODE_SYSTEM, 0b110, _) => Op::Csrrsi,
            (OPCODE_SYSTEM, 0b111, _) => Op::Csrrci,

            _ => return Err(self.illegal()),
        };
        Ok(op)
    }
}

/// Decode a raw word into its fields and operation.
pub fn decode(raw: u32) -> Result<(Instruction, Op), Trap> {
    let inst = Instruction::parse(raw);
    let op = inst.op()?;
    Ok((inst, op))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    // Loads
    Lb,
    Lh,
    Lw,
    Ld,
    Lbu,
    Lhu,
    Lwu,
    Fence,
    // Immediate ALU
    Addi,
    Slli,
    Slti,
    Sltiu,
    Xori,
    Srli,
    Srai,
    Ori,
    Andi,
    Auipc,
    // Word immediate ALU
    Addiw,
    Slliw,
    Srliw,
    Sraiw,
    // Stores
    Sb,
    Sh,
    Sw,
    Sd,
    // Register ALU
    Add,
    Sub,
    Mul,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
    Lui,
    // Word register ALU
    Addw,
    Subw,
    Sllw,
    Srlw,
    Sraw,
    Divuw,
    Remuw,
    // Control flow
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
    Jalr,
    Jal,
    // System
    Sret,
    Mret,
    SfenceVma,
    Csrrw,
    Csrrs,
    Csrrc,
    Csrrwi,
    Csrrsi,
    Csrrci,
}

impl Op {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Op::Lb => "lb",
            Op::Lh => "lh",
            Op::Lw => "lw",
            Op::Ld => "ld",
            Op::Lbu => "lbu",
            Op::Lhu => "lhu",
            Op::Lwu => "lwu",
            Op::Fence => "fence",
            Op::Addi => "addi",
            Op::Slli => "slli",
            Op::Slti => "slti",
            Op::Sltiu => "sltiu",
            Op::Xori => "xori",
            Op::Srli => "srli",
            Op::Srai => "srai",
            Op::Ori => "ori",
            Op::Andi => "andi",
            Op::Auipc => "auipc",
            Op::Addiw => "addiw",
            Op::Slliw => "slliw",
            Op::Srliw => "srliw",
            Op::Sraiw => "sraiw",
            Op::Sb => "sb",
            Op::Sh => "sh",
            Op::Sw => "sw",
            Op::Sd => "sd",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Sll => "sll",
            Op::Slt => "slt",
            Op::Sltu => "sltu",
            Op::Xor => "xor",
            Op::Srl => "srl",
            Op::Sra => "sra",
            Op::Or => "or",
            Op::And => "and",
            Op::Lui => "lui",
            Op::Addw => "addw",
            Op::Subw => "subw",
            Op::Sllw => "sllw",
            Op::Srlw => "srlw",
            Op::Sraw => "sraw",
            Op::Divuw => "divuw",
            Op::Remuw => "remuw",
            Op::Beq => "beq",
            Op::Bne => "bne",
            Op::Blt => "blt",
            Op::Bge => "bge",
            Op::Bltu => "bltu",
            Op::Bgeu => "bgeu",
            Op::Jalr => "jalr",
            Op::Jal => "jal",
            Op::Sret => "sret",
            Op::Mret => "mret",
            Op::SfenceVma => "sfence.vma",
            Op::Csrrw => "csrrw",
            Op::Csrrs => "csrrs",
            Op::Csrrc => "csrrc",
            Op::Csrrwi => "csrrwi",
            Op::Csrrsi => "csrrsi",
            Op::Csrrci => "csrrci",
        }
    }
}
