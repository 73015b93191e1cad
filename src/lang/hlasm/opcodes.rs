//! # Operation code table
//!
//! The base table maps every known mnemonic to its instruction family and,
//! for machine instructions, to the descriptor used for size and operand
//! checking.  It is built once per process and never mutated, OPSYN effects
//! live in a per-context overlay that is consulted first.  A deletion is
//! recorded as an explicit tombstone so later lookups answer "undefined"
//! rather than falling through to the base definition.
//!
//! The machine instruction list covers the commonly used S/370 through
//! z/Architecture base formats.  Extended branch mnemonics carry the
//! descriptor of their base instruction with the mask operand absorbed.

use std::collections::HashMap;
use std::sync::OnceLock;
use super::ids::Id;

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum InstructionKind {
    Machine,
    Mnemonic,
    Assembler,
    Ca,
    Macro,
    Undefined
}

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum MachineFormat {
    RR,
    RRE,
    RX,
    RXY,
    RS,
    RSY,
    RI,
    RIL,
    SI,
    S,
    SS,
    I
}

impl MachineFormat {
    /// encoded size in bytes, always a multiple of the halfword alignment
    pub fn size(&self) -> i64 {
        match self {
            Self::RR | Self::I => 2,
            Self::RRE | Self::RX | Self::RS | Self::RI | Self::SI | Self::S => 4,
            Self::RXY | Self::RSY | Self::RIL | Self::SS => 6
        }
    }
}

#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub struct MachineDescriptor {
    pub format: MachineFormat,
    pub min_operands: usize,
    pub max_operands: usize
}

/// Kind plus the detail used for operand checking.  The canonical id
/// survives OPSYN aliasing, dispatch always sees the original mnemonic.
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub struct Opcode {
    pub canon: Id,
    pub kind: InstructionKind,
    pub mach: Option<MachineDescriptor>
}

/// What a name resolves to after the overlay and macro storage are consulted.
/// A macro target is bound by name, the definition current at invocation wins.
#[derive(Clone,Copy,PartialEq,Debug)]
pub enum OpcodeRef {
    Op(Opcode),
    Macro(Id)
}

const ASM_OPS: [&str; 38] = [
    "CSECT","DSECT","RSECT","COM","LOCTR","EQU","DC","DS","COPY","DXD",
    "EXTRN","WXTRN","ORG","OPSYN","AINSERT","CCW","CCW0","CCW1","CNOP","START",
    "ALIAS","END","LTORG","USING","DROP","PUSH","POP","MNOTE","CXD","TITLE",
    "PUNCH","CATTR","XATTR","SPACE","EJECT","PRINT","AMODE","RMODE"
];

const CA_OPS: [&str; 20] = [
    "SETA","SETB","SETC","LCLA","LCLB","LCLC","GBLA","GBLB","GBLC","ANOP",
    "AIF","AGO","ACTR","AREAD","ASPACE","AEJECT","MACRO","MEND","MEXIT","MHELP"
];

const RR_OPS: [&str; 22] = [
    "LR","AR","SR","MR","DR","CR","ALR","SLR","NR","OR","XR","LTR","LCR","LNR",
    "LPR","BALR","BASR","BCTR","LER","LDR","CDR","CER"
];

const RX_OPS: [&str; 32] = [
    "L","ST","A","S","M","D","C","AL","SL","N","O","X","LA","LH","STH","AH","SH",
    "MH","CH","IC","STC","EX","BAL","BAS","BCT","CVB","CVD","LE","LD","STE","STD","AE"
];

const RS_OPS: [&str; 17] = [
    "LM","STM","CS","CDS","BXH","BXLE","SLL","SRL","SLA","SRA","SLDL","SRDL",
    "SLDA","SRDA","ICM","STCM","CLM"
];

const RI_OPS: [&str; 6] = ["AHI","CHI","LHI","MHI","BRAS","BRCT"];

const RIL_OPS: [&str; 2] = ["LARL","BRASL"];

const SI_OPS: [&str; 7] = ["CLI","MVI","NI","OI","XI","TM","TS"];

const SS_OPS: [&str; 21] = [
    "MVC","CLC","NC","OC","XC","TR","TRT","ED","EDMK","PACK","UNPK","ZAP","AP",
    "SP","MP","DP","CP","MVN","MVZ","MVO","SRP"
];

/// extended mnemonics with the mask operand absorbed, (name, base format, operands)
const BRANCH_MNEMONICS: [(&str, MachineFormat, usize); 34] = [
    ("B",MachineFormat::RX,1), ("BR",MachineFormat::RR,1),
    ("NOP",MachineFormat::RX,1), ("NOPR",MachineFormat::RR,1),
    ("BH",MachineFormat::RX,1), ("BL",MachineFormat::RX,1), ("BE",MachineFormat::RX,1),
    ("BNH",MachineFormat::RX,1), ("BNL",MachineFormat::RX,1), ("BNE",MachineFormat::RX,1),
    ("BO",MachineFormat::RX,1), ("BNO",MachineFormat::RX,1),
    ("BZ",MachineFormat::RX,1), ("BNZ",MachineFormat::RX,1),
    ("BM",MachineFormat::RX,1), ("BNM",MachineFormat::RX,1),
    ("BP",MachineFormat::RX,1), ("BNP",MachineFormat::RX,1),
    ("BHR",MachineFormat::RR,1), ("BLR",MachineFormat::RR,1), ("BER",MachineFormat::RR,1),
    ("BNHR",MachineFormat::RR,1), ("BNLR",MachineFormat::RR,1), ("BNER",MachineFormat::RR,1),
    ("J",MachineFormat::RI,1), ("JE",MachineFormat::RI,1), ("JNE",MachineFormat::RI,1),
    ("JH",MachineFormat::RI,1), ("JL",MachineFormat::RI,1), ("JNH",MachineFormat::RI,1),
    ("JNL",MachineFormat::RI,1), ("JZ",MachineFormat::RI,1), ("JNZ",MachineFormat::RI,1),
    ("JNOP",MachineFormat::RI,1)
];

fn build_table() -> HashMap<Id,Opcode> {
    let mut map = HashMap::new();
    let mut add = |name: &str, kind: InstructionKind, mach: Option<MachineDescriptor>| {
        if let Some(id) = Id::inline(name) {
            map.insert(id,Opcode { canon: id, kind, mach });
        }
    };
    let mach = |format: MachineFormat, min_operands: usize, max_operands: usize| {
        Some(MachineDescriptor { format, min_operands, max_operands })
    };
    for name in ASM_OPS {
        add(name,InstructionKind::Assembler,None);
    }
    for name in CA_OPS {
        add(name,InstructionKind::Ca,None);
    }
    for name in RR_OPS {
        add(name,InstructionKind::Machine,mach(MachineFormat::RR,2,2));
    }
    add("SPM",InstructionKind::Machine,mach(MachineFormat::RR,1,1));
    add("BCR",InstructionKind::Machine,mach(MachineFormat::RR,2,2));
    add("SVC",InstructionKind::Machine,mach(MachineFormat::I,1,1));
    for name in RX_OPS {
        add(name,InstructionKind::Machine,mach(MachineFormat::RX,2,2));
    }
    add("BC",InstructionKind::Machine,mach(MachineFormat::RX,2,2));
    for name in RS_OPS {
        add(name,InstructionKind::Machine,mach(MachineFormat::RS,2,3));
    }
    for name in RI_OPS {
        add(name,InstructionKind::Machine,mach(MachineFormat::RI,2,2));
    }
    add("BRC",InstructionKind::Machine,mach(MachineFormat::RI,2,2));
    for name in RIL_OPS {
        add(name,InstructionKind::Machine,mach(MachineFormat::RIL,2,2));
    }
    for name in SI_OPS {
        add(name,InstructionKind::Machine,mach(MachineFormat::SI,1,2));
    }
    for name in SS_OPS {
        add(name,InstructionKind::Machine,mach(MachineFormat::SS,2,3));
    }
    for (name,format,ops) in BRANCH_MNEMONICS {
        add(name,InstructionKind::Mnemonic,mach(format,ops,ops));
    }
    map
}

static BASE_TABLE: OnceLock<HashMap<Id,Opcode>> = OnceLock::new();

/// the immutable process-wide table, built on first use
pub fn base_table() -> &'static HashMap<Id,Opcode> {
    BASE_TABLE.get_or_init(build_table)
}

/// Per-context OPSYN overlay.  The base table is never mutated, queries
/// consult the overlay first.  `Some(None)` answers are tombstones.
#[derive(Clone)]
pub struct OpsynLayer {
    map: HashMap<Id,Option<OpcodeRef>>
}

impl OpsynLayer {
    pub fn new() -> Self {
        Self { map: HashMap::new() }
    }
    /// `A OPSYN B`, target already resolved through the current state
    pub fn alias(&mut self, name: Id, target: OpcodeRef) {
        self.map.insert(name,Some(target));
    }
    /// `A OPSYN ,` records a tombstone distinguishable from never-defined
    pub fn delete(&mut self, name: Id) {
        self.map.insert(name,None);
    }
    /// outer None means the overlay has nothing to say about this name
    pub fn lookup(&self, name: &Id) -> Option<Option<OpcodeRef>> {
        self.map.get(name).copied()
    }
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
