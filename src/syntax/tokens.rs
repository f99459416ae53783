use compact_str::CompactString;
use phf::{phf_map, phf_set};

use crate::sources::Location;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub payload: TokenPayload,
    pub location: Location,
}

/// The operand encoding class of an instruction, as carried by the opcode catalog.
/// The lexer and the disassembler treat these as opaque; only the operand's
/// *shape* matters here, never its semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    InlineNone,
    ShortInlineI,
    InlineI,
    InlineI8,
    ShortInlineR,
    InlineR,
    ShortInlineVar,
    InlineVar,
    ShortInlineBrTarget,
    InlineBrTarget,
    InlineMethod,
    InlineSig,
    InlineType,
    InlineField,
    InlineString,
    InlineTok,
    InlineSwitch,
}

/// One entry of the opcode catalog: the canonical mnemonic plus its operand class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpCode {
    pub name: &'static str,
    pub operand: OperandKind,
}

macro_rules! define_tokens {
    (
        $(#[$enum_attr:meta])*
        pub enum $enum_name:ident {$(
            #[name = $descr:tt]
            $(#[$attr:meta])*
            $token:ident $(($($fields:ty),* $(,)?))? ,
        )*}
    ) => {
        $(#[$enum_attr])*
        #[derive(strum_macros::Display)]
        pub enum $enum_name {$(
            #[doc = $descr]
            #[strum(to_string = $descr)]
            $(#[$attr])*
            $token $(($($fields,)*))? ,
        )*}

        // Two rules per token, so that `tok!("integer")(num)` expands into a single
        // AST node; repetition syntax belongs to the outer macro, hence the duplication.
        macro_rules! tok {$(
            ($descr) => {$crate::syntax::tokens::$enum_name::$token};
            ($descr $params:tt) => {$crate::syntax::tokens::$enum_name::$token $params};
        )*}
        pub(crate) use tok;
    }
}

define_tokens! {
    #[derive(Debug, Clone, PartialEq)]
    pub enum TokenPayload {
        #[name = "end of input"]
        Eof,

        #[name = "identifier"]
        Ident(CompactString),
        #[name = "compound name"]
        CompoundName(CompactString),
        #[name = "quoted string"]
        QString(CompactString),
        #[name = "singly quoted string"]
        SqString(CompactString),
        #[name = "integer constant"]
        Int(i64),
        #[name = "float constant"]
        Float(f64),
        #[name = "hex byte"]
        HexByte(u8),

        #[name = "instruction"]
        Op(OpCode),
        #[name = "directive"]
        Directive(&'static str),
        #[name = "keyword"]
        Keyword(&'static str),

        // Punctuation.
        #[name = "."]
        Dot,
        #[name = "#"]
        Hash,
        #[name = "..."]
        Ellipsis,
        #[name = "-"]
        Dash,
        #[name = "("]
        OpenParen,
        #[name = ")"]
        CloseParen,
        // Braces get worded names: `strum` rejects a bare brace as a display
        // string, since it parses them as format-string syntax.
        #[name = "opening brace"]
        OpenBrace,
        #[name = "closing brace"]
        CloseBrace,
        #[name = "["]
        OpenBracket,
        #[name = "]"]
        CloseBracket,
        #[name = "<"]
        OpenAngle,
        #[name = ">"]
        CloseAngle,
        #[name = ","]
        Comma,
        #[name = ":"]
        Colon,
        #[name = "::"]
        DoubleColon,
        #[name = ";"]
        Semicolon,
        #[name = "="]
        Assign,
        #[name = "!"]
        Bang,
        #[name = "&"]
        Amp,
        #[name = "+"]
        Plus,
        #[name = "*"]
        Star,
        #[name = "/"]
        Slash,
    }
}

/// Looks up a plain or dotted mnemonic, cloning its canonical token on a hit.
pub fn lookup_opcode(name: &str) -> Option<TokenPayload> {
    OPCODES
        .get_entry(name)
        .map(|(&name, &operand)| TokenPayload::Op(OpCode { name, operand }))
}

/// Looks up a directive; `name` must include its leading `.` or `#` sentinel.
pub fn lookup_directive(name: &str) -> Option<TokenPayload> {
    DIRECTIVES
        .get_key(name)
        .map(|&name| TokenPayload::Directive(name))
}

pub fn lookup_keyword(name: &str) -> Option<TokenPayload> {
    KEYWORDS.get_key(name).map(|&name| TokenPayload::Keyword(name))
}

pub fn is_opcode(name: &str) -> bool {
    OPCODES.contains_key(name)
}

pub fn is_directive(name: &str) -> bool {
    matches!(name.as_bytes().first(), Some(b'.' | b'#')) && DIRECTIVES.contains(name)
}

pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(name)
}

use OperandKind::*;

pub static OPCODES: phf::Map<&'static str, OperandKind> = phf_map! {
    "nop" => InlineNone,
    "break" => InlineNone,
    "ldarg.0" => InlineNone,
    "ldarg.1" => InlineNone,
    "ldarg.2" => InlineNone,
    "ldarg.3" => InlineNone,
    "ldloc.0" => InlineNone,
    "ldloc.1" => InlineNone,
    "ldloc.2" => InlineNone,
    "ldloc.3" => InlineNone,
    "stloc.0" => InlineNone,
    "stloc.1" => InlineNone,
    "stloc.2" => InlineNone,
    "stloc.3" => InlineNone,
    "ldarg.s" => ShortInlineVar,
    "ldarga.s" => ShortInlineVar,
    "starg.s" => ShortInlineVar,
    "ldloc.s" => ShortInlineVar,
    "ldloca.s" => ShortInlineVar,
    "stloc.s" => ShortInlineVar,
    "ldnull" => InlineNone,
    "ldc.i4.m1" => InlineNone,
    "ldc.i4.0" => InlineNone,
    "ldc.i4.1" => InlineNone,
    "ldc.i4.2" => InlineNone,
    "ldc.i4.3" => InlineNone,
    "ldc.i4.4" => InlineNone,
    "ldc.i4.5" => InlineNone,
    "ldc.i4.6" => InlineNone,
    "ldc.i4.7" => InlineNone,
    "ldc.i4.8" => InlineNone,
    "ldc.i4.s" => ShortInlineI,
    "ldc.i4" => InlineI,
    "ldc.i8" => InlineI8,
    "ldc.r4" => ShortInlineR,
    "ldc.r8" => InlineR,
    "dup" => InlineNone,
    "pop" => InlineNone,
    "jmp" => InlineMethod,
    "call" => InlineMethod,
    "calli" => InlineSig,
    "ret" => InlineNone,
    "br.s" => ShortInlineBrTarget,
    "brfalse.s" => ShortInlineBrTarget,
    "brtrue.s" => ShortInlineBrTarget,
    "beq.s" => ShortInlineBrTarget,
    "bge.s" => ShortInlineBrTarget,
    "bgt.s" => ShortInlineBrTarget,
    "ble.s" => ShortInlineBrTarget,
    "blt.s" => ShortInlineBrTarget,
    "bne.un.s" => ShortInlineBrTarget,
    "bge.un.s" => ShortInlineBrTarget,
    "bgt.un.s" => ShortInlineBrTarget,
    "ble.un.s" => ShortInlineBrTarget,
    "blt.un.s" => ShortInlineBrTarget,
    "br" => InlineBrTarget,
    "brfalse" => InlineBrTarget,
    "brtrue" => InlineBrTarget,
    "beq" => InlineBrTarget,
    "bge" => InlineBrTarget,
    "bgt" => InlineBrTarget,
    "ble" => InlineBrTarget,
    "blt" => InlineBrTarget,
    "bne.un" => InlineBrTarget,
    "bge.un" => InlineBrTarget,
    "bgt.un" => InlineBrTarget,
    "ble.un" => InlineBrTarget,
    "blt.un" => InlineBrTarget,
    "switch" => InlineSwitch,
    "ldind.i1" => InlineNone,
    "ldind.u1" => InlineNone,
    "ldind.i2" => InlineNone,
    "ldind.u2" => InlineNone,
    "ldind.i4" => InlineNone,
    "ldind.u4" => InlineNone,
    "ldind.i8" => InlineNone,
    "ldind.i" => InlineNone,
    "ldind.r4" => InlineNone,
    "ldind.r8" => InlineNone,
    "ldind.ref" => InlineNone,
    "stind.ref" => InlineNone,
    "stind.i1" => InlineNone,
    "stind.i2" => InlineNone,
    "stind.i4" => InlineNone,
    "stind.i8" => InlineNone,
    "stind.r4" => InlineNone,
    "stind.r8" => InlineNone,
    "stind.i" => InlineNone,
    "add" => InlineNone,
    "sub" => InlineNone,
    "mul" => InlineNone,
    "div" => InlineNone,
    "div.un" => InlineNone,
    "rem" => InlineNone,
    "rem.un" => InlineNone,
    "and" => InlineNone,
    "or" => InlineNone,
    "xor" => InlineNone,
    "shl" => InlineNone,
    "shr" => InlineNone,
    "shr.un" => InlineNone,
    "neg" => InlineNone,
    "not" => InlineNone,
    "conv.i1" => InlineNone,
    "conv.i2" => InlineNone,
    "conv.i4" => InlineNone,
    "conv.i8" => InlineNone,
    "conv.r4" => InlineNone,
    "conv.r8" => InlineNone,
    "conv.u4" => InlineNone,
    "conv.u8" => InlineNone,
    "conv.r.un" => InlineNone,
    "conv.u2" => InlineNone,
    "conv.u1" => InlineNone,
    "conv.i" => InlineNone,
    "conv.u" => InlineNone,
    "conv.ovf.i1" => InlineNone,
    "conv.ovf.u1" => InlineNone,
    "conv.ovf.i2" => InlineNone,
    "conv.ovf.u2" => InlineNone,
    "conv.ovf.i4" => InlineNone,
    "conv.ovf.u4" => InlineNone,
    "conv.ovf.i8" => InlineNone,
    "conv.ovf.u8" => InlineNone,
    "conv.ovf.i" => InlineNone,
    "conv.ovf.u" => InlineNone,
    "conv.ovf.i1.un" => InlineNone,
    "conv.ovf.i2.un" => InlineNone,
    "conv.ovf.i4.un" => InlineNone,
    "conv.ovf.i8.un" => InlineNone,
    "conv.ovf.u1.un" => InlineNone,
    "conv.ovf.u2.un" => InlineNone,
    "conv.ovf.u4.un" => InlineNone,
    "conv.ovf.u8.un" => InlineNone,
    "conv.ovf.i.un" => InlineNone,
    "conv.ovf.u.un" => InlineNone,
    "callvirt" => InlineMethod,
    "cpobj" => InlineType,
    "ldobj" => InlineType,
    "ldstr" => InlineString,
    "newobj" => InlineMethod,
    "castclass" => InlineType,
    "isinst" => InlineType,
    "unbox" => InlineType,
    "unbox.any" => InlineType,
    "box" => InlineType,
    "throw" => InlineNone,
    "rethrow" => InlineNone,
    "ldfld" => InlineField,
    "ldflda" => InlineField,
    "stfld" => InlineField,
    "ldsfld" => InlineField,
    "ldsflda" => InlineField,
    "stsfld" => InlineField,
    "stobj" => InlineType,
    "newarr" => InlineType,
    "ldlen" => InlineNone,
    "ldelema" => InlineType,
    "ldelem.i1" => InlineNone,
    "ldelem.u1" => InlineNone,
    "ldelem.i2" => InlineNone,
    "ldelem.u2" => InlineNone,
    "ldelem.i4" => InlineNone,
    "ldelem.u4" => InlineNone,
    "ldelem.i8" => InlineNone,
    "ldelem.i" => InlineNone,
    "ldelem.r4" => InlineNone,
    "ldelem.r8" => InlineNone,
    "ldelem.ref" => InlineNone,
    "stelem.i" => InlineNone,
    "stelem.i1" => InlineNone,
    "stelem.i2" => InlineNone,
    "stelem.i4" => InlineNone,
    "stelem.i8" => InlineNone,
    "stelem.r4" => InlineNone,
    "stelem.r8" => InlineNone,
    "stelem.ref" => InlineNone,
    "ldelem" => InlineType,
    "stelem" => InlineType,
    "refanyval" => InlineType,
    "refanytype" => InlineNone,
    "mkrefany" => InlineType,
    "ckfinite" => InlineNone,
    "ldtoken" => InlineTok,
    "ldftn" => InlineMethod,
    "ldvirtftn" => InlineMethod,
    "ldarg" => InlineVar,
    "ldarga" => InlineVar,
    "starg" => InlineVar,
    "ldloc" => InlineVar,
    "ldloca" => InlineVar,
    "stloc" => InlineVar,
    "localloc" => InlineNone,
    "endfilter" => InlineNone,
    "endfinally" => InlineNone,
    "leave" => InlineBrTarget,
    "leave.s" => ShortInlineBrTarget,
    "arglist" => InlineNone,
    "ceq" => InlineNone,
    "cgt" => InlineNone,
    "cgt.un" => InlineNone,
    "clt" => InlineNone,
    "clt.un" => InlineNone,
    "initobj" => InlineType,
    "cpblk" => InlineNone,
    "initblk" => InlineNone,
    "sizeof" => InlineType,
    // Prefixes keep their trailing dot; the lexer's whitespace fallback relies on it.
    "tail." => InlineNone,
    "unaligned." => ShortInlineI,
    "volatile." => InlineNone,
    "readonly." => InlineNone,
    "constrained." => InlineType,
};

pub static DIRECTIVES: phf::Set<&'static str> = phf_set! {
    ".addon",
    ".assembly",
    ".cctor",
    ".class",
    ".corflags",
    ".ctor",
    ".custom",
    ".data",
    ".emitbyte",
    ".entrypoint",
    ".event",
    ".export",
    ".field",
    ".file",
    ".fire",
    ".get",
    ".hash",
    ".imagebase",
    ".import",
    ".language",
    ".line",
    "#line",
    ".locale",
    ".localized",
    ".locals",
    ".manifestres",
    ".maxstack",
    ".method",
    ".module",
    ".mresource",
    ".namespace",
    ".other",
    ".override",
    ".pack",
    ".param",
    ".pdirect",
    ".permission",
    ".permissionset",
    ".property",
    ".publickey",
    ".publickeytoken",
    ".removeon",
    ".set",
    ".size",
    ".stackreserve",
    ".subsystem",
    ".try",
    ".ver",
    ".vtable",
    ".vtentry",
    ".vtfixup",
    ".zeroinit",
};

pub static KEYWORDS: phf::Set<&'static str> = phf_set! {
    "abstract",
    "algorithm",
    "alignment",
    "ansi",
    "any",
    "array",
    "as",
    "assembly",
    "assert",
    "at",
    "auto",
    "autochar",
    "beforefieldinit",
    "bool",
    "boxed",
    "bytearray",
    "byvalstr",
    "catch",
    "cdecl",
    "char",
    "cil",
    "class",
    "compilercontrolled",
    "const",
    "default",
    "demand",
    "deny",
    "enum",
    "explicit",
    "extends",
    "extern",
    "false",
    "famandassem",
    "family",
    "famorassem",
    "fastcall",
    "fault",
    "field",
    "filter",
    "final",
    "finally",
    "fixed",
    "float",
    "float32",
    "float64",
    "forwardref",
    "fromunmanaged",
    "handler",
    "hidebysig",
    "il",
    "illegal",
    "implements",
    "implicitcom",
    "implicitres",
    "import",
    "in",
    "inheritcheck",
    "init",
    "initonly",
    "instance",
    "int",
    "int16",
    "int32",
    "int64",
    "int8",
    "interface",
    "internalcall",
    "lasterr",
    "lcid",
    "linkcheck",
    "literal",
    "managed",
    "marshal",
    "method",
    "modopt",
    "modreq",
    "native",
    "nested",
    "newslot",
    "noappdomain",
    "noinlining",
    "nomachine",
    "nomangle",
    "nometadata",
    "noncasdemand",
    "noncasinheritance",
    "noncaslinkdemand",
    "noprocess",
    "notremotable",
    "notserialized",
    "null",
    "nullref",
    "object",
    "objectref",
    "opt",
    "optil",
    "out",
    "permitonly",
    "pinned",
    "pinvokeimpl",
    "prejitdeny",
    "prejitgrant",
    "preservesig",
    "private",
    "privatescope",
    "protected",
    "public",
    "readonly",
    "record",
    "refany",
    "reqmin",
    "reqopt",
    "reqrefuse",
    "reqsecobj",
    "request",
    "retval",
    "rtspecialname",
    "runtime",
    "sealed",
    "sequential",
    "serializable",
    "special",
    "specialname",
    "static",
    "stdcall",
    "storage",
    "stored_object",
    "stream",
    "streamed_object",
    "string",
    "struct",
    "synchronized",
    "syschar",
    "sysstring",
    "tbstr",
    "thiscall",
    "tls",
    "to",
    "true",
    "typedref",
    "unicode",
    "unmanaged",
    "unmanagedexp",
    "unsigned",
    "unused",
    "userdefined",
    "value",
    "valuetype",
    "vararg",
    "variant",
    "vector",
    "virtual",
    "void",
    "wchar",
    "winapi",
    "with",
    "wrapper",
};
