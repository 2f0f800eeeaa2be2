//! The opcode table: every non-push opcode, its byte value, mnemonic, and category.
//!
//! Push operations (OP_0, direct pushes, OP_PUSHDATA1/2/4, OP_1NEGATE, OP_1..OP_16)
//! are not listed here; the parser resolves them into push operations directly.

/// Next byte is the push length (up to 255 bytes).
pub const OP_PUSHDATA1: u8 = 0x4c;
/// Next two bytes are the push length (little-endian, up to 65535 bytes).
pub const OP_PUSHDATA2: u8 = 0x4d;
/// Next four bytes are the push length (little-endian).
pub const OP_PUSHDATA4: u8 = 0x4e;
/// Pushes -1 onto the stack.
pub const OP_1NEGATE: u8 = 0x4f;
/// Pushes the empty item (zero / false) onto the stack.
pub const OP_0: u8 = 0x00;
/// Base byte for OP_1 through OP_16 (`OP_N = OP_1_OFFSET + n`).
pub const OP_1_OFFSET: u8 = 0x50;
/// Largest direct push length (a leading byte 1..=75 pushes that many bytes).
pub const MAX_DIRECT_PUSH: u8 = 75;

/// Behavioral category of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// IF/NOTIF/ELSE/ENDIF, VERIFY, RETURN, NOP.
    FlowControl,
    /// Main and alt stack manipulation.
    Stack,
    /// Byte-string inspection (SIZE).
    Splice,
    /// Byte-for-byte equality.
    Bitwise,
    /// Script-number arithmetic and comparison.
    Arithmetic,
    /// Hashing and signature checks.
    Crypto,
    /// Absolute and relative timelock checks.
    Locktime,
    /// Upgradable no-ops; execute without effect.
    Nop,
    /// Reserved opcodes; fail the script when executed.
    Reserved,
    /// Disabled opcodes; fail the script wherever they appear.
    Disabled,
}

macro_rules! opcodes {
    ($($variant:ident = $byte:literal, $name:literal, $cat:ident;)*) => {
        /// A non-push script opcode, resolved once at parse time.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $(
                #[doc = concat!("The `", $name, "` opcode.")]
                $variant = $byte,
            )*
        }

        impl Opcode {
            /// Looks up an opcode by its byte value.
            #[must_use]
            pub fn from_byte(byte: u8) -> Option<Opcode> {
                match byte {
                    $($byte => Some(Opcode::$variant),)*
                    _ => None,
                }
            }

            /// Looks up an opcode by its mnemonic, e.g. `"OP_DUP"`.
            #[must_use]
            pub fn from_name(name: &str) -> Option<Opcode> {
                match name {
                    $($name => Some(Opcode::$variant),)*
                    _ => None,
                }
            }

            /// The opcode's mnemonic.
            #[must_use]
            pub fn name(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $name,)*
                }
            }

            /// The opcode's behavioral category.
            #[must_use]
            pub fn category(self) -> Category {
                match self {
                    $(Opcode::$variant => Category::$cat,)*
                }
            }

            /// The opcode's byte value in serialized scripts.
            #[must_use]
            pub fn to_byte(self) -> u8 {
                self as u8
            }
        }
    };
}

opcodes! {
    // Reserved words below the push range
    Reserved = 0x50, "OP_RESERVED", Reserved;

    // Flow control
    Nop = 0x61, "OP_NOP", FlowControl;
    Ver = 0x62, "OP_VER", Reserved;
    If = 0x63, "OP_IF", FlowControl;
    NotIf = 0x64, "OP_NOTIF", FlowControl;
    VerIf = 0x65, "OP_VERIF", Disabled;
    VerNotIf = 0x66, "OP_VERNOTIF", Disabled;
    Else = 0x67, "OP_ELSE", FlowControl;
    EndIf = 0x68, "OP_ENDIF", FlowControl;
    Verify = 0x69, "OP_VERIFY", FlowControl;
    Return = 0x6a, "OP_RETURN", FlowControl;

    // Stack operations
    ToAltStack = 0x6b, "OP_TOALTSTACK", Stack;
    FromAltStack = 0x6c, "OP_FROMALTSTACK", Stack;
    TwoDrop = 0x6d, "OP_2DROP", Stack;
    TwoDup = 0x6e, "OP_2DUP", Stack;
    ThreeDup = 0x6f, "OP_3DUP", Stack;
    TwoOver = 0x70, "OP_2OVER", Stack;
    TwoRot = 0x71, "OP_2ROT", Stack;
    TwoSwap = 0x72, "OP_2SWAP", Stack;
    IfDup = 0x73, "OP_IFDUP", Stack;
    Depth = 0x74, "OP_DEPTH", Stack;
    Drop = 0x75, "OP_DROP", Stack;
    Dup = 0x76, "OP_DUP", Stack;
    Nip = 0x77, "OP_NIP", Stack;
    Over = 0x78, "OP_OVER", Stack;
    Pick = 0x79, "OP_PICK", Stack;
    Roll = 0x7a, "OP_ROLL", Stack;
    Rot = 0x7b, "OP_ROT", Stack;
    Swap = 0x7c, "OP_SWAP", Stack;
    Tuck = 0x7d, "OP_TUCK", Stack;

    // Splice (all but SIZE are disabled)
    Cat = 0x7e, "OP_CAT", Disabled;
    Substr = 0x7f, "OP_SUBSTR", Disabled;
    Left = 0x80, "OP_LEFT", Disabled;
    Right = 0x81, "OP_RIGHT", Disabled;
    Size = 0x82, "OP_SIZE", Splice;

    // Bitwise logic (all but the EQUAL family is disabled)
    Invert = 0x83, "OP_INVERT", Disabled;
    And = 0x84, "OP_AND", Disabled;
    Or = 0x85, "OP_OR", Disabled;
    Xor = 0x86, "OP_XOR", Disabled;
    Equal = 0x87, "OP_EQUAL", Bitwise;
    EqualVerify = 0x88, "OP_EQUALVERIFY", Bitwise;
    Reserved1 = 0x89, "OP_RESERVED1", Reserved;
    Reserved2 = 0x8a, "OP_RESERVED2", Reserved;

    // Arithmetic
    OneAdd = 0x8b, "OP_1ADD", Arithmetic;
    OneSub = 0x8c, "OP_1SUB", Arithmetic;
    TwoMul = 0x8d, "OP_2MUL", Disabled;
    TwoDiv = 0x8e, "OP_2DIV", Disabled;
    Negate = 0x8f, "OP_NEGATE", Arithmetic;
    Abs = 0x90, "OP_ABS", Arithmetic;
    Not = 0x91, "OP_NOT", Arithmetic;
    ZeroNotEqual = 0x92, "OP_0NOTEQUAL", Arithmetic;
    Add = 0x93, "OP_ADD", Arithmetic;
    Sub = 0x94, "OP_SUB", Arithmetic;
    Mul = 0x95, "OP_MUL", Disabled;
    Div = 0x96, "OP_DIV", Disabled;
    Mod = 0x97, "OP_MOD", Disabled;
    LShift = 0x98, "OP_LSHIFT", Disabled;
    RShift = 0x99, "OP_RSHIFT", Disabled;
    BoolAnd = 0x9a, "OP_BOOLAND", Arithmetic;
    BoolOr = 0x9b, "OP_BOOLOR", Arithmetic;
    NumEqual = 0x9c, "OP_NUMEQUAL", Arithmetic;
    NumEqualVerify = 0x9d, "OP_NUMEQUALVERIFY", Arithmetic;
    NumNotEqual = 0x9e, "OP_NUMNOTEQUAL", Arithmetic;
    LessThan = 0x9f, "OP_LESSTHAN", Arithmetic;
    GreaterThan = 0xa0, "OP_GREATERTHAN", Arithmetic;
    LessThanOrEqual = 0xa1, "OP_LESSTHANOREQUAL", Arithmetic;
    GreaterThanOrEqual = 0xa2, "OP_GREATERTHANOREQUAL", Arithmetic;
    Min = 0xa3, "OP_MIN", Arithmetic;
    Max = 0xa4, "OP_MAX", Arithmetic;
    Within = 0xa5, "OP_WITHIN", Arithmetic;

    // Cryptography
    Ripemd160 = 0xa6, "OP_RIPEMD160", Crypto;
    Sha1 = 0xa7, "OP_SHA1", Crypto;
    Sha256 = 0xa8, "OP_SHA256", Crypto;
    Hash160 = 0xa9, "OP_HASH160", Crypto;
    Hash256 = 0xaa, "OP_HASH256", Crypto;
    CodeSeparator = 0xab, "OP_CODESEPARATOR", Crypto;
    CheckSig = 0xac, "OP_CHECKSIG", Crypto;
    CheckSigVerify = 0xad, "OP_CHECKSIGVERIFY", Crypto;
    CheckMultiSig = 0xae, "OP_CHECKMULTISIG", Crypto;
    CheckMultiSigVerify = 0xaf, "OP_CHECKMULTISIGVERIFY", Crypto;

    // Upgradable no-ops and locktime
    Nop1 = 0xb0, "OP_NOP1", Nop;
    CheckLockTimeVerify = 0xb1, "OP_CHECKLOCKTIMEVERIFY", Locktime;
    CheckSequenceVerify = 0xb2, "OP_CHECKSEQUENCEVERIFY", Locktime;
    Nop4 = 0xb3, "OP_NOP4", Nop;
    Nop5 = 0xb4, "OP_NOP5", Nop;
    Nop6 = 0xb5, "OP_NOP6", Nop;
    Nop7 = 0xb6, "OP_NOP7", Nop;
    Nop8 = 0xb7, "OP_NOP8", Nop;
    Nop9 = 0xb8, "OP_NOP9", Nop;
    Nop10 = 0xb9, "OP_NOP10", Nop;
}
