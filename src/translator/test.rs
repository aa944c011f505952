use std::collections::BTreeMap;
use std::sync::Arc;

use crate::dump::{BlockDescriptor, DumpIndex};
use crate::error::*;
use crate::il::*;
use crate::image::{Image, MemoryPermissions};
use crate::translator::{Lift, Lifter, Options, OptionsBuilder, Terminator, Translator};

/// A lifter scripted with one super-block per address, standing in for the
/// native library.
struct ScriptedLifter {
    blocks: BTreeMap<u64, (SuperBlock, u64)>,
}

impl ScriptedLifter {
    fn new() -> ScriptedLifter {
        ScriptedLifter {
            blocks: BTreeMap::new(),
        }
    }

    fn script(mut self, address: u64, ir: SuperBlock, real_end: u64) -> ScriptedLifter {
        self.blocks.insert(address, (ir, real_end));
        self
    }
}

impl Lifter for ScriptedLifter {
    fn lift(&mut self, _bytes: &[u8], address: u64, _max_instructions: usize) -> Result<Lift<'_>> {
        match self.blocks.get(&address) {
            Some((ir, real_end)) => Ok(Lift::new(ir, *real_end)),
            None => Err(
                ErrorKind::LifterError(format!("no lift scripted at 0x{:x}", address)).into(),
            ),
        }
    }
}

fn ir(jump_kind: JumpKind, next: Expression, statements: Vec<Statement>) -> SuperBlock {
    let mut block = SuperBlock::new(jump_kind, next);
    for statement in statements {
        block.push(statement);
    }
    block
}

fn image() -> Image {
    let mut image = Image::new();
    image.add_section(
        0x1000,
        vec![0x90; 0x9000],
        MemoryPermissions::READ | MemoryPermissions::EXECUTE,
    );
    image
}

fn dump(functions: Vec<(u64, Vec<BlockDescriptor>)>, non_returning: Vec<u64>) -> DumpIndex {
    DumpIndex::new(
        functions.into_iter().collect(),
        non_returning.into_iter().collect(),
    )
}

fn translator(lifter: ScriptedLifter, dump: DumpIndex) -> Translator {
    Translator::new(image(), dump, Box::new(lifter), Options::new())
}

fn ret_lifter(address: u64) -> ScriptedLifter {
    ScriptedLifter::new().script(
        address,
        ir(
            JumpKind::Return,
            expr_const(0, 64),
            vec![Statement::imark(address, 4)],
        ),
        address + 4,
    )
}

fn ret_dump(address: u64) -> DumpIndex {
    dump(
        vec![(
            address,
            vec![BlockDescriptor::new(address, address + 4, 1)],
        )],
        vec![],
    )
}

#[test]
fn function_with_one_block_ending_in_ret() {
    let lifter = ScriptedLifter::new().script(
        0x1000,
        ir(
            JumpKind::Return,
            expr_const(0, 64),
            vec![
                Statement::imark(0x1000, 4),
                Statement::imark(0x1004, 4),
                Statement::imark(0x1008, 4),
                Statement::imark(0x100c, 2),
            ],
        ),
        0x100e,
    );
    let translator = translator(
        lifter,
        dump(
            vec![(0x1000, vec![BlockDescriptor::new(0x1000, 0x1010, 4)])],
            vec![],
        ),
    );

    let function = translator.get(0x1000).unwrap();
    assert!(function.is_finalized());
    assert_eq!(function.address(), 0x1000);
    assert_eq!(function.blocks().len(), 1);

    let terminator = function.block(0x1000).unwrap().terminator();
    assert_eq!(*terminator, Terminator::Return);
    assert_eq!(terminator.target(), 0);
    assert_eq!(terminator.fall_through(), 0);
    assert!(!terminator.is_tail());
}

#[test]
fn conditional_branch_with_fall_through() {
    let lifter = ScriptedLifter::new().script(
        0x2000,
        ir(
            JumpKind::Boring,
            expr_const(0x2020, 64),
            vec![
                Statement::imark(0x2018, 4),
                Statement::imark(0x201c, 4),
                Statement::exit(expr_scalar("zf", 1), const_(0x3000, 64)),
            ],
        ),
        0x2020,
    );
    let translator = translator(
        lifter,
        dump(
            vec![(0x2000, vec![BlockDescriptor::new(0x2000, 0x2020, 2)])],
            vec![],
        ),
    );

    let function = translator.get(0x2000).unwrap();
    assert_eq!(
        *function.block(0x2000).unwrap().terminator(),
        Terminator::Jcc {
            target: 0x3000,
            fall_through: 0x2020
        }
    );
}

#[test]
fn call_to_non_returning_callee_is_promoted() {
    let lifter = ScriptedLifter::new().script(
        0x1000,
        ir(
            JumpKind::Call,
            expr_const(0x4000, 64),
            vec![Statement::imark(0x1000, 5)],
        ),
        0x1005,
    );
    let translator = translator(
        lifter,
        dump(
            vec![(0x1000, vec![BlockDescriptor::new(0x1000, 0x1005, 1)])],
            vec![0x4000],
        ),
    );

    let function = translator.get(0x1000).unwrap();
    assert_eq!(
        *function.block(0x1000).unwrap().terminator(),
        Terminator::NoReturn {
            target: 0x4000,
            fall_through: 0x1005
        }
    );
}

#[test]
fn jump_to_non_returning_callee_is_promoted() {
    let lifter = ScriptedLifter::new().script(
        0x1000,
        ir(
            JumpKind::Boring,
            expr_const(0x4000, 64),
            vec![Statement::imark(0x1000, 4)],
        ),
        0x1004,
    );
    let translator = translator(
        lifter,
        dump(
            vec![(0x1000, vec![BlockDescriptor::new(0x1000, 0x1004, 1)])],
            vec![0x4000],
        ),
    );

    let function = translator.get(0x1000).unwrap();
    let terminator = function.block(0x1000).unwrap().terminator();
    assert_eq!(
        *terminator,
        Terminator::NoReturn {
            target: 0x4000,
            fall_through: 0
        }
    );
    // Tail-jump detection only considers jumps; a promoted terminator is
    // left alone.
    assert!(!terminator.is_tail());
}

#[test]
fn overshot_block_is_truncated_to_a_fall_through() {
    // The dump declares two instructions; the lifter runs through three.
    let lifter = ScriptedLifter::new().script(
        0x5000,
        ir(
            JumpKind::Boring,
            expr_scalar("rax", 64),
            vec![
                Statement::imark(0x5000, 4),
                Statement::assign(scalar("t0", 64), expr_const(1, 64)),
                Statement::imark(0x5004, 4),
                Statement::imark(0x5008, 4),
                Statement::assign(scalar("t1", 64), expr_const(2, 64)),
            ],
        ),
        0x500c,
    );
    let translator = translator(
        lifter,
        dump(
            vec![(0x5000, vec![BlockDescriptor::new(0x5000, 0x5008, 2)])],
            vec![],
        ),
    );

    let function = translator.get(0x5000).unwrap();
    let block = function.block(0x5000).unwrap();

    assert_eq!(block.super_block().jump_kind(), JumpKind::NoDecode);
    assert_eq!(block.super_block().instruction_count(), 2);
    assert_eq!(block.super_block().next(), &expr_const(0x5008, 64));
    assert_eq!(
        *block.terminator(),
        Terminator::Fallthrough {
            fall_through: 0x5008
        }
    );
}

#[test]
fn undershot_block_is_split_at_the_call() {
    // The dump declares five instructions; the lifter splits after three,
    // at a call instruction.
    let lifter = ScriptedLifter::new()
        .script(
            0x6000,
            ir(
                JumpKind::Call,
                expr_const(0x6100, 64),
                vec![
                    Statement::imark(0x6000, 16),
                    Statement::imark(0x6010, 16),
                    Statement::imark(0x6020, 16),
                ],
            ),
            0x6030,
        )
        .script(
            0x6030,
            ir(
                JumpKind::Return,
                expr_const(0, 64),
                vec![Statement::imark(0x6030, 8), Statement::imark(0x6038, 8)],
            ),
            0x6040,
        );
    let translator = translator(
        lifter,
        dump(
            vec![(0x6000, vec![BlockDescriptor::new(0x6000, 0x6040, 5)])],
            vec![],
        ),
    );

    let function = translator.get(0x6000).unwrap();
    assert_eq!(function.blocks().len(), 2);
    assert_eq!(
        *function.block(0x6000).unwrap().terminator(),
        Terminator::Call {
            target: 0x6100,
            fall_through: 0x6030
        }
    );
    assert_eq!(
        *function.block(0x6030).unwrap().terminator(),
        Terminator::Return
    );
}

#[test]
fn tail_jumps_leave_the_function() {
    let lifter = ScriptedLifter::new()
        .script(
            0x7000,
            ir(
                JumpKind::Boring,
                expr_const(0x7040, 64),
                vec![Statement::imark(0x7000, 4)],
            ),
            0x7004,
        )
        .script(
            0x7040,
            ir(
                JumpKind::Boring,
                expr_const(0x9000, 64),
                vec![Statement::imark(0x7040, 4)],
            ),
            0x7044,
        );
    let translator = translator(
        lifter,
        dump(
            vec![(
                0x7000,
                vec![
                    BlockDescriptor::new(0x7000, 0x7004, 1),
                    BlockDescriptor::new(0x7040, 0x7044, 1),
                ],
            )],
            vec![],
        ),
    );

    let function = translator.get(0x7000).unwrap();

    // 0x7040 is a block of this function; 0x9000 is not.
    assert_eq!(
        *function.block(0x7000).unwrap().terminator(),
        Terminator::Jump {
            target: 0x7040,
            is_tail: false
        }
    );
    assert_eq!(
        *function.block(0x7040).unwrap().terminator(),
        Terminator::Jump {
            target: 0x9000,
            is_tail: true
        }
    );
}

#[test]
fn empty_descriptors_are_skipped() {
    let lifter = ret_lifter(0x1000);
    let translator = translator(
        lifter,
        dump(
            vec![(
                0x1000,
                vec![
                    BlockDescriptor::new(0x5000, 0x5000, 0),
                    BlockDescriptor::new(0x1000, 0x1004, 1),
                ],
            )],
            vec![],
        ),
    );

    let function = translator.get(0x1000).unwrap();
    assert_eq!(function.blocks().len(), 1);
    assert!(function.block(0x5000).is_none());
}

#[test]
fn duplicate_descriptors_translate_once() {
    let lifter = ret_lifter(0x1000);
    let translator = translator(
        lifter,
        dump(
            vec![(
                0x1000,
                vec![
                    BlockDescriptor::new(0x1000, 0x1004, 1),
                    BlockDescriptor::new(0x1000, 0x1004, 1),
                ],
            )],
            vec![],
        ),
    );

    let function = translator.get(0x1000).unwrap();
    assert_eq!(function.blocks().len(), 1);
}

#[test]
fn get_memoizes_translated_functions() {
    let translator = translator(ret_lifter(0x1000), ret_dump(0x1000));

    let first = translator.get(0x1000).unwrap();
    let second = translator.get(0x1000).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let third = translator.maybe_get(0x1000).unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &third));
}

#[test]
fn translation_is_deterministic() {
    let build = || {
        let translator = translator(
            ScriptedLifter::new()
                .script(
                    0x6000,
                    ir(
                        JumpKind::Call,
                        expr_const(0x6100, 64),
                        vec![Statement::imark(0x6000, 16), Statement::imark(0x6010, 32)],
                    ),
                    0x6030,
                )
                .script(
                    0x6030,
                    ir(
                        JumpKind::Return,
                        expr_const(0, 64),
                        vec![Statement::imark(0x6030, 8)],
                    ),
                    0x6038,
                ),
            dump(
                vec![(0x6000, vec![BlockDescriptor::new(0x6000, 0x6038, 3)])],
                vec![],
            ),
        );
        translator.get(0x6000).unwrap()
    };

    assert_eq!(*build(), *build());
}

#[test]
fn unknown_addresses_surface_as_errors_or_absence() {
    let translator = translator(ret_lifter(0x1000), ret_dump(0x1000));

    assert!(translator.get(0xdead).is_err());
    assert!(translator.cget(0xdead).is_err());
    assert!(translator.maybe_get(0xdead).unwrap().is_none());
}

#[test]
fn cget_does_not_translate_on_demand() {
    let translator = translator(ret_lifter(0x1000), ret_dump(0x1000));

    assert!(translator.cget(0x1000).is_err());
    translator.get(0x1000).unwrap();
    assert!(translator.cget(0x1000).is_ok());
}

#[test]
fn failed_translation_abandons_the_function() {
    // The second block has no scripted lift, so the lifter errors on it.
    let lifter = ScriptedLifter::new().script(
        0x3000,
        ir(
            JumpKind::Boring,
            expr_const(0x3004, 64),
            vec![Statement::imark(0x3000, 4)],
        ),
        0x3004,
    );
    let translator = translator(
        lifter,
        dump(
            vec![(
                0x3000,
                vec![
                    BlockDescriptor::new(0x3000, 0x3004, 1),
                    BlockDescriptor::new(0x3004, 0x3008, 1),
                ],
            )],
            vec![],
        ),
    );

    assert!(translator.get(0x3000).is_err());
    // No partial function is exposed.
    assert!(translator.cget(0x3000).is_err());
    assert!(translator.containing(0x3000).is_err());
}

#[test]
fn lift_without_instruction_marks_is_a_translation_error() {
    let lifter = ScriptedLifter::new().script(
        0x1000,
        ir(JumpKind::Boring, expr_scalar("rax", 64), vec![]),
        0x1000,
    );
    let translator = translator(lifter, ret_dump(0x1000));

    match translator.get(0x1000) {
        Err(Error(ErrorKind::TranslationError(address), _)) => assert_eq!(address, 0x1000),
        other => panic!("expected TranslationError, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn containing_finds_the_function_spanning_an_address() {
    let translator = translator(ret_lifter(0x1000), ret_dump(0x1000));
    translator.get(0x1000).unwrap();

    assert_eq!(translator.containing(0x1002).unwrap().address(), 0x1000);
    // The block covers [0x1000, 0x1004).
    assert!(translator.containing(0x1004).is_err());
    assert!(translator.containing(0x2000).is_err());
}

#[test]
fn xrefs_accumulate_and_survive_finalization() {
    let translator = translator(ret_lifter(0x1000), ret_dump(0x1000));
    translator.get(0x1000).unwrap();

    translator.add_xref(0x1000, 0x8000).unwrap();
    translator.finalize();
    translator.add_xref(0x1000, 0x8040).unwrap();
    translator.add_vfunc_xref(0x1000, 0x8080).unwrap();

    let xrefs = translator.xrefs(0x1000).unwrap();
    assert!(xrefs.contains(&0x8000));
    assert!(xrefs.contains(&0x8040));
    assert_eq!(xrefs.len(), 2);

    let vfunc_xrefs = translator.vfunc_xrefs(0x1000).unwrap();
    assert!(vfunc_xrefs.contains(&0x8080));
    assert_eq!(vfunc_xrefs.len(), 1);

    assert!(translator.add_xref(0xdead, 0x8000).is_err());
    assert!(translator.vfunc_xrefs(0xdead).is_err());
}

#[test]
fn finalization_rejects_bulk_mutation() {
    let translator = translator(ret_lifter(0x1000), ret_dump(0x1000));
    translator.get(0x1000).unwrap();

    assert_eq!(translator.functions_mutable().unwrap().len(), 1);
    assert!(!translator.is_finalized());

    translator.finalize();
    translator.finalize();
    assert!(translator.is_finalized());

    match translator.functions_mutable() {
        Err(Error(ErrorKind::AlreadyFinalized, _)) => {}
        _ => panic!("expected AlreadyFinalized"),
    }

    // Single-entry lookups still work.
    assert!(translator.cget(0x1000).is_ok());
}

#[test]
fn eager_mode_translates_all_known_functions() {
    let lifter = ScriptedLifter::new()
        .script(
            0x1000,
            ir(
                JumpKind::Return,
                expr_const(0, 64),
                vec![Statement::imark(0x1000, 4)],
            ),
            0x1004,
        )
        .script(
            0x2000,
            ir(
                JumpKind::Return,
                expr_const(0, 64),
                vec![Statement::imark(0x2000, 4)],
            ),
            0x2004,
        );
    let index = dump(
        vec![
            (0x1000, vec![BlockDescriptor::new(0x1000, 0x1004, 1)]),
            (0x2000, vec![BlockDescriptor::new(0x2000, 0x2004, 1)]),
            // Not scripted: abandoned with a warning, others unaffected.
            (0x3000, vec![BlockDescriptor::new(0x3000, 0x3004, 1)]),
        ],
        vec![],
    );
    let options = OptionsBuilder::new().parse_on_demand(false).build();
    let translator = Translator::new(image(), index, Box::new(lifter), options);

    assert!(translator.cget(0x1000).is_ok());
    assert!(translator.cget(0x2000).is_ok());
    assert!(translator.cget(0x3000).is_err());
}

#[test]
fn lift_failures_surface_the_lifter_error() {
    let translator = translator(ScriptedLifter::new(), ret_dump(0x1000));

    match translator.get(0x1000) {
        Err(Error(ErrorKind::LifterError(_), _)) => {}
        other => panic!("expected LifterError, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn reads_outside_the_image_fail() {
    // 0x20000 lies outside the mapped section.
    let translator = translator(
        ScriptedLifter::new(),
        dump(
            vec![(0x20000, vec![BlockDescriptor::new(0x20000, 0x20004, 1)])],
            vec![],
        ),
    );

    match translator.get(0x20000) {
        Err(Error(ErrorKind::ImageError(address), _)) => assert_eq!(address, 0x20000),
        other => panic!("expected ImageError, got {:?}", other.map(|_| ())),
    }
}
