use pretty_assertions::assert_eq;
use rilasm::{
    disasm::{
        escape, make_label, CallConv, Disassembler, GenericParam, HandlerKind, HandlerRegion,
        ImplAttrs, Instr, Local, MethodAttrs, MethodBody, Operand, Param, Variance,
    },
    syntax::tokens::{lookup_opcode, OpCode, TokenPayload},
};

fn op(name: &str) -> OpCode {
    match lookup_opcode(name) {
        Some(TokenPayload::Op(opcode)) => opcode,
        _ => panic!("not a cataloged opcode: {name}"),
    }
}

fn instr(offset: u32, name: &str) -> Instr {
    Instr { offset, opcode: op(name), operand: Operand::None }
}

fn bracket_balance(text: &str) -> (usize, usize) {
    (
        text.chars().filter(|&c| c == '{').count(),
        text.chars().filter(|&c| c == '}').count(),
    )
}

#[test]
fn minimal_method_renders_exactly() {
    let body = MethodBody {
        attrs: MethodAttrs::PUBLIC | MethodAttrs::STATIC,
        call_conv: CallConv::Default,
        return_type: "void".into(),
        name: "Main".into(),
        max_stack: 1,
        is_entry_point: true,
        instructions: vec![instr(0, "ret")],
        ..MethodBody::default()
    };

    assert_eq!(
        Disassembler::new().disassemble(&body),
        "\
.method public static default void Main ()
{
    .entrypoint
    .maxstack 1

    IL_0000:  ret
}
",
    );
}

#[test]
fn locals_render_with_init_and_escaping() {
    let body = MethodBody {
        attrs: MethodAttrs::PRIVATE,
        return_type: "void".into(),
        name: "Frob".into(),
        max_stack: 2,
        locals: vec![
            Local { ty: "int32".into(), name: "x".into() },
            Local { ty: "string".into(), name: "class".into() },
        ],
        init_locals: true,
        instructions: vec![instr(0, "ret")],
        ..MethodBody::default()
    };

    let text = Disassembler::new().disassemble(&body);
    assert!(text.contains(".locals init (int32 x, string 'class')"), "{text}");
}

#[test]
fn try_catch_brackets_are_balanced_and_nested() {
    let body = MethodBody {
        return_type: "void".into(),
        name: "Guarded".into(),
        max_stack: 1,
        instructions: vec![
            instr(0, "nop"),
            Instr { offset: 1, opcode: op("leave"), operand: Operand::Branch(4) },
            instr(2, "pop"),
            Instr { offset: 3, opcode: op("leave"), operand: Operand::Branch(4) },
            instr(4, "ret"),
        ],
        handlers: vec![HandlerRegion {
            try_start: 0,
            handler_start: 2,
            filter_start: None,
            handler_end: 4,
            kind: HandlerKind::Catch,
            catch_type: Some("[mscorlib]System.Exception".into()),
        }],
        ..MethodBody::default()
    };

    let text = Disassembler::new().disassemble(&body);
    let (opens, closes) = bracket_balance(&text);
    assert_eq!(opens, closes);
    assert!(text.contains(".try"), "{text}");
    assert!(text.contains("catch [mscorlib]System.Exception"), "{text}");
    // The try body and the handler body each get exactly one bracket pair
    // besides the method's own.
    assert_eq!(opens, 3);
}

#[test]
fn nested_regions_balance_regardless_of_list_order() {
    let outer = HandlerRegion {
        try_start: 0,
        handler_start: 6,
        filter_start: None,
        handler_end: 9,
        kind: HandlerKind::Finally,
        catch_type: None,
    };
    let inner = HandlerRegion {
        try_start: 1,
        handler_start: 3,
        filter_start: None,
        handler_end: 5,
        kind: HandlerKind::Catch,
        catch_type: Some("[mscorlib]System.Exception".into()),
    };

    let body_with = |handlers: Vec<HandlerRegion>| MethodBody {
        return_type: "void".into(),
        name: "Nested".into(),
        max_stack: 1,
        instructions: (0..9)
            .map(|offset| instr(offset, "nop"))
            .chain([instr(9, "ret")])
            .collect(),
        handlers,
        ..MethodBody::default()
    };

    let forward =
        Disassembler::new().disassemble(&body_with(vec![outer.clone(), inner.clone()]));
    let reversed = Disassembler::new().disassemble(&body_with(vec![inner, outer]));

    // One bracket pair per region's try, one per its handler, one for the
    // method body itself.
    assert_eq!(bracket_balance(&forward), (5, 5), "{forward}");
    assert_eq!(forward, reversed);
    // The inner region must sit fully inside the outer try.
    let outer_try = forward.find(".try").expect("no outer try");
    let inner_try = forward.rfind(".try").expect("no inner try");
    let inner_close = forward.find("catch").expect("no catch");
    let outer_handler = forward.find("finally").expect("no finally");
    assert!(outer_try < inner_try && inner_try < inner_close && inner_close < outer_handler);
}

#[test]
fn handler_ending_at_end_of_body_is_still_closed() {
    let body = MethodBody {
        return_type: "void".into(),
        name: "TailFinally".into(),
        max_stack: 1,
        instructions: vec![
            instr(0, "nop"),
            Instr { offset: 1, opcode: op("leave"), operand: Operand::Branch(3) },
            instr(2, "endfinally"),
            instr(3, "ret"),
        ],
        handlers: vec![HandlerRegion {
            try_start: 0,
            handler_start: 2,
            filter_start: None,
            // Exclusive boundary past the last instruction.
            handler_end: 5,
            kind: HandlerKind::Finally,
            catch_type: None,
        }],
        ..MethodBody::default()
    };

    let text = Disassembler::new().disassemble(&body);
    let (opens, closes) = bracket_balance(&text);
    assert_eq!(opens, closes);
    assert!(text.contains("finally"), "{text}");
}

#[test]
fn filter_region_closes_filter_bracket_at_handler_start() {
    let body = MethodBody {
        return_type: "void".into(),
        name: "Filtered".into(),
        max_stack: 1,
        instructions: vec![
            instr(0, "nop"),
            Instr { offset: 1, opcode: op("leave"), operand: Operand::Branch(5) },
            instr(2, "ldc.i4.1"),
            instr(3, "endfilter"),
            instr(4, "pop"),
            instr(5, "ret"),
        ],
        handlers: vec![HandlerRegion {
            try_start: 0,
            handler_start: 4,
            filter_start: Some(2),
            handler_end: 5,
            kind: HandlerKind::Filter,
            catch_type: None,
        }],
        ..MethodBody::default()
    };

    let text = Disassembler::new().disassemble(&body);
    let (opens, closes) = bracket_balance(&text);
    assert_eq!(opens, closes);
    assert!(text.contains("filter"), "{text}");
}

#[test]
fn covariant_class_constrained_generic_renders_variance_first() {
    let body = MethodBody {
        attrs: MethodAttrs::PUBLIC,
        return_type: "void".into(),
        name: "Generic".into(),
        generic_params: vec![GenericParam {
            name: "T".into(),
            variance: Variance::Covariant,
            has_class_constraint: true,
            ..GenericParam::default()
        }],
        max_stack: 1,
        instructions: vec![instr(0, "ret")],
        ..MethodBody::default()
    };

    let text = Disassembler::new().disassemble(&body);
    assert!(text.contains("<+ class T>"), "{text}");
}

#[test]
fn generic_constraint_list_is_parenthesized() {
    let body = MethodBody {
        return_type: "void".into(),
        name: "Constrained".into(),
        generic_params: vec![GenericParam {
            name: "T".into(),
            variance: Variance::Contravariant,
            has_ctor_constraint: true,
            constraints: vec!["[mscorlib]System.IComparable".into()],
            ..GenericParam::default()
        }],
        max_stack: 1,
        instructions: vec![instr(0, "ret")],
        ..MethodBody::default()
    };

    let text = Disassembler::new().disassemble(&body);
    assert!(
        text.contains("<- .ctor ([mscorlib]System.IComparable) T>"),
        "{text}",
    );
}

#[test]
fn implementation_attributes_get_their_own_line() {
    let body = MethodBody {
        return_type: "void".into(),
        name: "Impl".into(),
        impl_attrs: ImplAttrs::CIL | ImplAttrs::MANAGED | ImplAttrs::NOOPTIMIZATION,
        max_stack: 1,
        instructions: vec![instr(0, "ret")],
        ..MethodBody::default()
    };

    let text = Disassembler::new().disassemble(&body);
    assert!(text.contains("cil managed nooptimization"), "{text}");
}

#[test]
fn parameters_render_types_and_escaped_names() {
    let body = MethodBody {
        return_type: "int32".into(),
        name: "Add".into(),
        params: vec![
            Param { ty: "int32".into(), name: "a".into() },
            Param { ty: "int32".into(), name: "my arg".into() },
        ],
        max_stack: 2,
        instructions: vec![instr(0, "ret")],
        ..MethodBody::default()
    };

    let text = Disassembler::new().disassemble(&body);
    assert!(text.contains("Add (int32 a, int32 'my arg')"), "{text}");
}

#[test]
fn token_operands_carry_their_kind_prefix() {
    let body = MethodBody {
        return_type: "void".into(),
        name: "Tokens".into(),
        max_stack: 1,
        instructions: vec![
            Instr {
                offset: 0,
                opcode: op("ldtoken"),
                operand: Operand::Method("void C::M()".into()),
            },
            Instr {
                offset: 5,
                opcode: op("call"),
                operand: Operand::Method("void C::M()".into()),
            },
            Instr {
                offset: 10,
                opcode: op("ldtoken"),
                operand: Operand::Field("int32 C::f".into()),
            },
            instr(15, "ret"),
        ],
        ..MethodBody::default()
    };

    let text = Disassembler::new().disassemble(&body);
    assert!(text.contains("ldtoken method void C::M()"), "{text}");
    assert!(text.contains("call void C::M()"), "{text}");
    assert!(!text.contains("call method"), "{text}");
    assert!(text.contains("ldtoken field int32 C::f"), "{text}");
}

#[test]
fn switch_operand_lists_labels() {
    let body = MethodBody {
        return_type: "void".into(),
        name: "Jump".into(),
        max_stack: 1,
        instructions: vec![
            Instr {
                offset: 0,
                opcode: op("switch"),
                operand: Operand::Switch(vec![13, 15]),
            },
            instr(13, "nop"),
            instr(15, "ret"),
        ],
        ..MethodBody::default()
    };

    let text = Disassembler::new().disassemble(&body);
    assert!(text.contains("switch ( IL_000d, IL_000f )"), "{text}");
}

#[test]
fn string_operands_are_quoted_and_escaped() {
    let body = MethodBody {
        return_type: "void".into(),
        name: "Say".into(),
        max_stack: 1,
        instructions: vec![
            Instr {
                offset: 0,
                opcode: op("ldstr"),
                operand: Operand::String("a \"b\"\n".into()),
            },
            instr(5, "ret"),
        ],
        ..MethodBody::default()
    };

    let text = Disassembler::new().disassemble(&body);
    assert!(text.contains(r#"ldstr "a \"b\"\n""#), "{text}");
}

#[test]
fn unnamed_variable_operands_fall_back_to_indices() {
    let body = MethodBody {
        return_type: "void".into(),
        name: "Vars".into(),
        max_stack: 1,
        instructions: vec![
            Instr {
                offset: 0,
                opcode: op("ldloc.s"),
                operand: Operand::Local { index: 3, name: "".into() },
            },
            Instr {
                offset: 2,
                opcode: op("ldarg.s"),
                operand: Operand::Param { index: 0, name: "self".into() },
            },
            instr(4, "ret"),
        ],
        ..MethodBody::default()
    };

    let text = Disassembler::new().disassemble(&body);
    assert!(text.contains("ldloc.s 3"), "{text}");
    assert!(text.contains("ldarg.s self"), "{text}");
}

#[test]
fn labels_are_four_digit_hex() {
    assert_eq!(make_label(0), "IL_0000");
    assert_eq!(make_label(0xabc), "IL_0abc");
    assert_eq!(make_label(0x12345), "IL_12345");
}

#[test]
fn names_outside_the_plain_grammar_are_quoted() {
    assert_eq!(escape("Main"), "Main");
    assert_eq!(escape("_hidden$slot"), "_hidden$slot");
    // Keywords, mnemonics, and directive-shaped names must be quoted.
    assert_eq!(escape("class"), "'class'");
    assert_eq!(escape("ret"), "'ret'");
    assert_eq!(escape("my method"), "'my method'");
    assert_eq!(escape("1stInstance"), "'1stInstance'");
    assert_eq!(escape("it's"), "'it\\'s'");
    assert_eq!(escape(""), "''");
}
