use std::fmt;

use jit_abi::RuntimeField;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Instruction(pub u8);

macro_rules! instructions {
    ($($name:ident = $byte:literal,)*) => {
        impl Instruction {
            $(pub const $name: Instruction = Instruction($byte);)*
        }

        const MNEMONICS: [Option<&str>; 256] = {
            let mut table = [None; 256];
            $(table[$byte] = Some(stringify!($name));)*
            table
        };
    };
}

instructions! {
    STOP = 0x00,
    ADD = 0x01,
    MUL = 0x02,
    SUB = 0x03,
    DIV = 0x04,
    SDIV = 0x05,
    MOD = 0x06,
    SMOD = 0x07,
    ADDMOD = 0x08,
    MULMOD = 0x09,
    EXP = 0x0a,
    SIGNEXTEND = 0x0b,

    LT = 0x10,
    GT = 0x11,
    SLT = 0x12,
    SGT = 0x13,
    EQ = 0x14,
    ISZERO = 0x15,
    AND = 0x16,
    OR = 0x17,
    XOR = 0x18,
    NOT = 0x19,
    BYTE = 0x1a,

    SHA3 = 0x20,

    ADDRESS = 0x30,
    BALANCE = 0x31,
    ORIGIN = 0x32,
    CALLER = 0x33,
    CALLVALUE = 0x34,
    CALLDATALOAD = 0x35,
    CALLDATASIZE = 0x36,
    CALLDATACOPY = 0x37,
    CODESIZE = 0x38,
    CODECOPY = 0x39,
    GASPRICE = 0x3a,
    EXTCODESIZE = 0x3b,
    EXTCODECOPY = 0x3c,

    PREVHASH = 0x40,
    COINBASE = 0x41,
    TIMESTAMP = 0x42,
    NUMBER = 0x43,
    DIFFICULTY = 0x44,
    GASLIMIT = 0x45,

    POP = 0x50,
    MLOAD = 0x51,
    MSTORE = 0x52,
    MSTORE8 = 0x53,
    SLOAD = 0x54,
    SSTORE = 0x55,
    JUMP = 0x56,
    JUMPI = 0x57,
    PC = 0x58,
    MSIZE = 0x59,
    GAS = 0x5a,
    JUMPDEST = 0x5b,

    PUSH1 = 0x60,
    PUSH2 = 0x61,
    PUSH3 = 0x62,
    PUSH4 = 0x63,
    PUSH5 = 0x64,
    PUSH6 = 0x65,
    PUSH7 = 0x66,
    PUSH8 = 0x67,
    PUSH9 = 0x68,
    PUSH10 = 0x69,
    PUSH11 = 0x6a,
    PUSH12 = 0x6b,
    PUSH13 = 0x6c,
    PUSH14 = 0x6d,
    PUSH15 = 0x6e,
    PUSH16 = 0x6f,
    PUSH17 = 0x70,
    PUSH18 = 0x71,
    PUSH19 = 0x72,
    PUSH20 = 0x73,
    PUSH21 = 0x74,
    PUSH22 = 0x75,
    PUSH23 = 0x76,
    PUSH24 = 0x77,
    PUSH25 = 0x78,
    PUSH26 = 0x79,
    PUSH27 = 0x7a,
    PUSH28 = 0x7b,
    PUSH29 = 0x7c,
    PUSH30 = 0x7d,
    PUSH31 = 0x7e,
    PUSH32 = 0x7f,

    DUP1 = 0x80,
    DUP2 = 0x81,
    DUP3 = 0x82,
    DUP4 = 0x83,
    DUP5 = 0x84,
    DUP6 = 0x85,
    DUP7 = 0x86,
    DUP8 = 0x87,
    DUP9 = 0x88,
    DUP10 = 0x89,
    DUP11 = 0x8a,
    DUP12 = 0x8b,
    DUP13 = 0x8c,
    DUP14 = 0x8d,
    DUP15 = 0x8e,
    DUP16 = 0x8f,

    SWAP1 = 0x90,
    SWAP2 = 0x91,
    SWAP3 = 0x92,
    SWAP4 = 0x93,
    SWAP5 = 0x94,
    SWAP6 = 0x95,
    SWAP7 = 0x96,
    SWAP8 = 0x97,
    SWAP9 = 0x98,
    SWAP10 = 0x99,
    SWAP11 = 0x9a,
    SWAP12 = 0x9b,
    SWAP13 = 0x9c,
    SWAP14 = 0x9d,
    SWAP15 = 0x9e,
    SWAP16 = 0x9f,

    LOG0 = 0xa0,
    LOG1 = 0xa1,
    LOG2 = 0xa2,
    LOG3 = 0xa3,
    LOG4 = 0xa4,

    CREATE = 0xf0,
    CALL = 0xf1,
    CALLCODE = 0xf2,
    RETURN = 0xf3,
    SUICIDE = 0xff,
}

impl Instruction {
    pub const fn from_u8(byte: u8) -> Option<Self> {
        match MNEMONICS[byte as usize] {
            Some(_) => Some(Instruction(byte)),
            None => None,
        }
    }

    pub const fn byte(self) -> u8 {
        self.0
    }

    pub const fn mnemonic(self) -> Option<&'static str> {
        MNEMONICS[self.0 as usize]
    }

    pub const fn immediate_size(self) -> usize {
        if self.0 >= Self::PUSH1.0 && self.0 <= Self::PUSH32.0 {
            (self.0 - Self::PUSH1.0 + 1) as usize
        } else {
            0
        }
    }

    pub const fn is_context_query(self) -> bool {
        context_field(self).is_some()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mnemonic() {
            Some(name) => f.write_str(name),
            None => write!(f, "INVALID({:#04x})", self.0),
        }
    }
}

pub const CONTEXT_FIELDS: [(Instruction, RuntimeField); 14] = [
    (Instruction::GAS, RuntimeField::Gas),
    (Instruction::ADDRESS, RuntimeField::Address),
    (Instruction::CALLER, RuntimeField::Caller),
    (Instruction::ORIGIN, RuntimeField::Origin),
    (Instruction::CALLVALUE, RuntimeField::CallValue),
    (Instruction::CALLDATASIZE, RuntimeField::CallDataSize),
    (Instruction::GASPRICE, RuntimeField::GasPrice),
    (Instruction::PREVHASH, RuntimeField::PrevHash),
    (Instruction::COINBASE, RuntimeField::CoinBase),
    (Instruction::TIMESTAMP, RuntimeField::TimeStamp),
    (Instruction::NUMBER, RuntimeField::Number),
    (Instruction::DIFFICULTY, RuntimeField::Difficulty),
    (Instruction::GASLIMIT, RuntimeField::GasLimit),
    (Instruction::CODESIZE, RuntimeField::CodeSize),
];

pub const fn context_field(inst: Instruction) -> Option<RuntimeField> {
    let mut i = 0;
    while i < CONTEXT_FIELDS.len() {
        if CONTEXT_FIELDS[i].0.0 == inst.0 {
            return Some(CONTEXT_FIELDS[i].1);
        }
        i += 1;
    }
    None
}

// Every non-internal field is read by exactly one valid instruction, and no
// instruction appears twice.
const _: () = {
    let mut seen = [0u8; RuntimeField::COUNT];
    let mut i = 0;
    while i < CONTEXT_FIELDS.len() {
        let (inst, field) = CONTEXT_FIELDS[i];
        assert!(inst.mnemonic().is_some(), "context table names an unassigned opcode");
        assert!(!field.is_internal(), "context table maps to an internal field");
        seen[field.index()] += 1;
        let mut j = i + 1;
        while j < CONTEXT_FIELDS.len() {
            assert!(CONTEXT_FIELDS[j].0.0 != inst.0, "opcode listed twice in context table");
            j += 1;
        }
        i += 1;
    }
    let mut f = 0;
    while f < RuntimeField::COUNT {
        let Some(field) = RuntimeField::from_index(f) else {
            panic!("field index out of range");
        };
        if field.is_internal() {
            assert!(seen[f] == 0, "internal field reachable by opcode");
        } else {
            assert!(seen[f] == 1, "field not covered exactly once by context table");
        }
        f += 1;
    }
};
