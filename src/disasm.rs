//! Rendering binary method bodies back into textual form.
//!
//! The input model is deliberately shallow: type, method, and field references
//! arrive already stringified by the metadata layer, and instructions carry
//! stable byte offsets. Everything here is about ordering keywords correctly
//! and nesting exception-handler brackets, which the binary format only
//! describes through start/end instruction boundaries.

use bitflags::bitflags;
use compact_str::CompactString;

use crate::syntax::tokens::{self, OpCode, OperandKind};

bitflags! {
    /// Method signature attributes, one rendered keyword per set bit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MethodAttrs: u32 {
        const PUBLIC             = 1 << 0;
        const PRIVATE            = 1 << 1;
        const FAMILY             = 1 << 2;
        const ASSEMBLY           = 1 << 3;
        const FAMANDASSEM        = 1 << 4;
        const FAMORASSEM         = 1 << 5;
        const STATIC             = 1 << 6;
        const FINAL              = 1 << 7;
        const VIRTUAL            = 1 << 8;
        const ABSTRACT           = 1 << 9;
        const HIDEBYSIG          = 1 << 10;
        const NEWSLOT            = 1 << 11;
        const REQSECOBJ          = 1 << 12;
        const RTSPECIALNAME      = 1 << 13;
        const SPECIALNAME        = 1 << 14;
        const STRICT             = 1 << 15;
        const COMPILERCONTROLLED = 1 << 16;
        const UNMANAGEDEXP       = 1 << 17;
        const INSTANCE           = 1 << 18;
        const EXPLICIT_THIS      = 1 << 19;
    }
}

// Rendering order is fixed; iteration over `bitflags` values is insertion-ordered,
// but the header writer spells the sequence out explicitly anyway so the output
// contract does not hinge on it.
const ATTR_KEYWORDS: &[(MethodAttrs, &str)] = &[
    (MethodAttrs::PUBLIC, "public"),
    (MethodAttrs::PRIVATE, "private"),
    (MethodAttrs::FAMILY, "family"),
    (MethodAttrs::ASSEMBLY, "assembly"),
    (MethodAttrs::FAMANDASSEM, "famandassem"),
    (MethodAttrs::FAMORASSEM, "famorassem"),
    (MethodAttrs::STATIC, "static"),
    (MethodAttrs::FINAL, "final"),
    (MethodAttrs::VIRTUAL, "virtual"),
    (MethodAttrs::ABSTRACT, "abstract"),
    (MethodAttrs::HIDEBYSIG, "hidebysig"),
    (MethodAttrs::NEWSLOT, "newslot"),
    (MethodAttrs::REQSECOBJ, "reqsecobj"),
    (MethodAttrs::RTSPECIALNAME, "rtspecialname"),
    (MethodAttrs::SPECIALNAME, "specialname"),
    (MethodAttrs::STRICT, "strict"),
    (MethodAttrs::COMPILERCONTROLLED, "compilercontrolled"),
    (MethodAttrs::UNMANAGEDEXP, "unmanagedexp"),
];

bitflags! {
    /// Implementation attributes, rendered on their own line when any is set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ImplAttrs: u32 {
        const NATIVE         = 1 << 0;
        const CIL            = 1 << 1;
        const MANAGED        = 1 << 2;
        const UNMANAGED      = 1 << 3;
        const FORWARDREF     = 1 << 4;
        const PRESERVESIG    = 1 << 5;
        const RUNTIME        = 1 << 6;
        const INTERNALCALL   = 1 << 7;
        const SYNCHRONIZED   = 1 << 8;
        const NOINLINING     = 1 << 9;
        const NOOPTIMIZATION = 1 << 10;
    }
}

const IMPL_KEYWORDS: &[(ImplAttrs, &str)] = &[
    (ImplAttrs::NATIVE, "native"),
    (ImplAttrs::CIL, "cil"),
    (ImplAttrs::MANAGED, "managed"),
    (ImplAttrs::UNMANAGED, "unmanaged"),
    (ImplAttrs::FORWARDREF, "forwardref"),
    (ImplAttrs::PRESERVESIG, "preservesig"),
    (ImplAttrs::RUNTIME, "runtime"),
    (ImplAttrs::INTERNALCALL, "internalcall"),
    (ImplAttrs::SYNCHRONIZED, "synchronized"),
    (ImplAttrs::NOINLINING, "noinlining"),
    (ImplAttrs::NOOPTIMIZATION, "nooptimization"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
pub enum CallConv {
    #[default]
    #[strum(to_string = "default")]
    Default,
    #[strum(to_string = "cdecl")]
    Cdecl,
    #[strum(to_string = "stdcall")]
    Stdcall,
    #[strum(to_string = "thiscall")]
    Thiscall,
    #[strum(to_string = "fastcall")]
    Fastcall,
    #[strum(to_string = "vararg")]
    Vararg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variance {
    #[default]
    None,
    Covariant,
    Contravariant,
}

#[derive(Debug, Clone, Default)]
pub struct GenericParam {
    pub name: CompactString,
    pub variance: Variance,
    pub has_ctor_constraint: bool,
    pub has_valuetype_constraint: bool,
    pub has_class_constraint: bool,
    /// Type constraints, already stringified by the metadata layer.
    pub constraints: Vec<CompactString>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub ty: CompactString,
    /// Empty when the parameter is unnamed.
    pub name: CompactString,
}

#[derive(Debug, Clone)]
pub struct Local {
    pub ty: CompactString,
    pub name: CompactString,
}

/// One decoded instruction. Offsets are byte positions within the body, and are
/// the identity that operand targets and handler boundaries refer to.
#[derive(Debug, Clone)]
pub struct Instr {
    pub offset: u32,
    pub opcode: OpCode,
    pub operand: Operand,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    Int(i64),
    Float(f64),
    /// Branch target, as the target instruction's offset.
    Branch(u32),
    Switch(Vec<u32>),
    Param { index: u32, name: CompactString },
    Local { index: u32, name: CompactString },
    Type(CompactString),
    Method(CompactString),
    Field(CompactString),
    String(CompactString),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Catch,
    Filter,
    Finally,
    Fault,
}

/// One exception-handler region, described purely by instruction boundaries.
/// `handler_end` is exclusive: it names the offset of the first instruction
/// after the handler, which may lie past the last instruction of the body.
/// Regions may nest but never partially overlap; the renderer assumes this.
#[derive(Debug, Clone)]
pub struct HandlerRegion {
    pub try_start: u32,
    pub handler_start: u32,
    pub filter_start: Option<u32>,
    pub handler_end: u32,
    pub kind: HandlerKind,
    /// Only meaningful for `Catch`.
    pub catch_type: Option<CompactString>,
}

#[derive(Debug, Clone, Default)]
pub struct MethodBody {
    pub attrs: MethodAttrs,
    pub impl_attrs: ImplAttrs,
    pub call_conv: CallConv,
    pub return_type: CompactString,
    pub name: CompactString,
    pub generic_params: Vec<GenericParam>,
    pub params: Vec<Param>,
    pub locals: Vec<Local>,
    pub init_locals: bool,
    pub max_stack: u32,
    pub is_entry_point: bool,
    pub instructions: Vec<Instr>,
    pub handlers: Vec<HandlerRegion>,
}

impl Default for Operand {
    fn default() -> Self {
        Self::None
    }
}

pub fn make_label(offset: u32) -> String {
    format!("IL_{offset:04x}")
}

fn is_plain_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '$' | '@' | '?' | '`')
}

/// Whether a name can appear unquoted in output. Anything that would lex as
/// something other than a plain identifier must be quoted.
fn is_plain_ident(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if first.is_ascii_digit() || !is_plain_char(first) {
        return false;
    }
    if !chars.all(is_plain_char) {
        return false;
    }
    !tokens::is_keyword(name) && !tokens::is_opcode(name) && !tokens::is_directive(name)
}

/// Quotes and escapes `name` if it cannot appear verbatim.
pub fn escape(name: &str) -> CompactString {
    if is_plain_ident(name) {
        return name.into();
    }
    let mut quoted = CompactString::const_new("'");
    for ch in name.chars() {
        match ch {
            '\'' => quoted.push_str("\\'"),
            '\\' => quoted.push_str("\\\\"),
            ch => quoted.push(ch),
        }
    }
    quoted.push('\'');
    quoted
}

pub fn escape_qstring(text: &str) -> CompactString {
    let mut escaped = CompactString::default();
    for ch in text.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            ch => escaped.push(ch),
        }
    }
    escaped
}

/// Indentation-tracking text sink; brackets always get their own line.
#[derive(Debug, Default)]
struct Writer {
    buf: String,
    depth: usize,
}

impl Writer {
    fn indented(&mut self, line: &str) {
        for _ in 0..self.depth {
            self.buf.push_str("    ");
        }
        self.buf.push_str(line);
        self.buf.push('\n');
    }

    fn blank(&mut self) {
        self.buf.push('\n');
    }

    fn open_bracket(&mut self) {
        self.indented("{");
        self.depth += 1;
    }

    fn close_bracket(&mut self) {
        self.depth -= 1;
        self.indented("}");
    }
}

/// Renders one method body. A fresh instance per method; no state survives
/// [`disassemble`][Self::disassemble].
#[derive(Debug, Default)]
pub struct Disassembler {
    writer: Writer,
}

impl Disassembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disassemble(mut self, body: &MethodBody) -> String {
        self.write_header(body);
        self.writer.open_bracket();

        if body.is_entry_point {
            self.writer.indented(".entrypoint");
        }
        self.writer.indented(&format!(".maxstack {}", body.max_stack));
        self.write_locals(body);
        self.write_instructions(body);

        self.writer.close_bracket();
        self.writer.buf
    }

    fn write_header(&mut self, body: &MethodBody) {
        let mut header = String::from(".method ");

        for &(flag, keyword) in ATTR_KEYWORDS {
            if body.attrs.contains(flag) {
                header.push_str(keyword);
                header.push(' ');
            }
        }
        if body.attrs.contains(MethodAttrs::INSTANCE) {
            header.push_str("instance ");
        }
        if body.attrs.contains(MethodAttrs::EXPLICIT_THIS) {
            header.push_str("explicit ");
        }

        header.push_str(&format!(
            "{} {} {}",
            body.call_conv,
            body.return_type,
            escape(&body.name)
        ));

        if !body.generic_params.is_empty() {
            header.push('<');
            for (i, gp) in body.generic_params.iter().enumerate() {
                if i != 0 {
                    header.push_str(", ");
                }
                write_generic_param(&mut header, gp);
            }
            header.push('>');
        }

        header.push_str(" (");
        for (i, param) in body.params.iter().enumerate() {
            if i != 0 {
                header.push_str(", ");
            }
            header.push_str(&param.ty);
            if !param.name.is_empty() {
                header.push(' ');
                header.push_str(&escape(&param.name));
            }
        }
        header.push(')');
        self.writer.indented(&header);

        if !body.impl_attrs.is_empty() {
            let mut impls = String::new();
            for &(flag, keyword) in IMPL_KEYWORDS {
                if body.impl_attrs.contains(flag) {
                    if !impls.is_empty() {
                        impls.push(' ');
                    }
                    impls.push_str(keyword);
                }
            }
            self.writer.indented(&impls);
        }
    }

    fn write_locals(&mut self, body: &MethodBody) {
        if body.locals.is_empty() {
            return;
        }

        let mut line = String::from(".locals");
        if body.init_locals {
            line.push_str(" init");
        }
        line.push_str(" (");
        for (i, local) in body.locals.iter().enumerate() {
            if i != 0 {
                line.push_str(", ");
            }
            line.push_str(&local.ty);
            if !local.name.is_empty() {
                line.push(' ');
                line.push_str(&escape(&local.name));
            }
        }
        line.push(')');
        self.writer.indented(&line);
    }

    fn write_instructions(&mut self, body: &MethodBody) {
        if body.instructions.is_empty() {
            return;
        }

        self.writer.blank();

        // Brackets are driven by boundary matches; the counters ensure every
        // handler-end closes exactly one bracket, and that a handler body left
        // open past the last instruction still gets closed.
        let mut try_open = 0usize;
        let mut filter_open = 0usize;
        let mut handler_open = 0usize;

        for instr in &body.instructions {
            for region in &body.handlers {
                if instr.offset == region.try_start {
                    try_open += 1;
                    self.writer.indented(".try");
                    self.writer.open_bracket();
                }

                if instr.offset == region.handler_start {
                    if try_open > 0 {
                        try_open -= 1;
                        self.writer.close_bracket();
                    }

                    match region.kind {
                        HandlerKind::Catch => {
                            let ty = region.catch_type.as_deref().unwrap_or("object");
                            self.writer.indented(&format!("catch {ty}"));
                        }
                        HandlerKind::Fault => self.writer.indented("fault"),
                        HandlerKind::Finally => self.writer.indented("finally"),
                        // A filter's handler clause has no keyword of its own;
                        // its filter bracket closes here instead.
                        HandlerKind::Filter => {
                            if filter_open > 0 {
                                filter_open -= 1;
                                self.writer.close_bracket();
                            }
                        }
                    }

                    handler_open += 1;
                    self.writer.open_bracket();
                }

                if Some(instr.offset) == region.filter_start {
                    filter_open += 1;
                    self.writer.indented("filter");
                    self.writer.open_bracket();
                }

                if instr.offset == region.handler_end && handler_open > 0 {
                    handler_open -= 1;
                    self.writer.close_bracket();
                }
            }

            self.write_instruction(instr);
        }

        // Regions whose handler runs to the very end of the body have an
        // exclusive end boundary past the last instruction.
        while handler_open > 0 {
            handler_open -= 1;
            self.writer.close_bracket();
        }
    }

    fn write_instruction(&mut self, instr: &Instr) {
        let mut line = format!("{}:  {}", make_label(instr.offset), instr.opcode.name);

        match &instr.operand {
            Operand::None => {}
            Operand::Int(value) => line.push_str(&format!(" {value}")),
            Operand::Float(value) => line.push_str(&format!(" {value}")),
            Operand::Branch(target) => {
                line.push(' ');
                line.push_str(&make_label(*target));
            }
            Operand::Switch(targets) => {
                line.push_str(" ( ");
                for (i, target) in targets.iter().enumerate() {
                    if i != 0 {
                        line.push_str(", ");
                    }
                    line.push_str(&make_label(*target));
                }
                line.push_str(" )");
            }
            Operand::Param { index, name } | Operand::Local { index, name } => {
                if name.is_empty() {
                    line.push_str(&format!(" {index}"));
                } else {
                    line.push(' ');
                    line.push_str(&escape(name));
                }
            }
            Operand::Type(name) => {
                line.push(' ');
                line.push_str(name);
            }
            Operand::Method(name) => {
                if instr.opcode.operand == OperandKind::InlineTok {
                    line.push_str(" method");
                }
                line.push(' ');
                line.push_str(name);
            }
            Operand::Field(name) => {
                if instr.opcode.operand == OperandKind::InlineTok {
                    line.push_str(" field");
                }
                line.push(' ');
                line.push_str(name);
            }
            Operand::String(text) => {
                line.push_str(&format!(" \"{}\"", escape_qstring(text)));
            }
        }

        self.writer.indented(&line);
    }
}

fn write_generic_param(out: &mut String, gp: &GenericParam) {
    match gp.variance {
        Variance::None => {}
        Variance::Covariant => out.push_str("+ "),
        Variance::Contravariant => out.push_str("- "),
    }
    if gp.has_ctor_constraint {
        out.push_str(".ctor ");
    }
    if gp.has_valuetype_constraint {
        out.push_str("valuetype ");
    }
    if gp.has_class_constraint {
        out.push_str("class ");
    }
    if !gp.constraints.is_empty() {
        out.push('(');
        for (i, constraint) in gp.constraints.iter().enumerate() {
            if i != 0 {
                out.push_str(", ");
            }
            out.push_str(constraint);
        }
        out.push_str(") ");
    }
    out.push_str(&escape(&gp.name));
}
