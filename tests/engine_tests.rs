//! Game engine integration tests: tasks, narrowing, the log, rollback.

mod common;

use common::{fixture_game, fixture_table};
use ruleset_engine::{
    ClassDeclaration, ClassName, ClassTableBuilder, CustomInstruction, CustomRegistry, Effect,
    ExecutionError, Expression, Game, GameEvent, GameReader, GameWriter, Instruction, Intensity,
    Player, StateChange, Transformers, Translation, Trigger, Type,
};

fn parse(text: &str) -> Instruction {
    text.parse().unwrap()
}

fn count_of(game: &Game, text: &str) -> i64 {
    let t = game.resolve(&text.parse().unwrap()).unwrap();
    game.count(&t)
}

fn owner() -> Player {
    Player::number(1)
}

// ---------------------------------------------------------------------------
// Direct execution
// ---------------------------------------------------------------------------

#[test]
fn test_gain_and_count() {
    let mut game = fixture_game();
    assert_eq!(count_of(&game, "Foo"), 0);
    game.execute_instruction(&parse("5 Foo!"), owner(), None)
        .unwrap();
    assert_eq!(count_of(&game, "Foo"), 5);
    assert_eq!(game.events().len(), 1);
}

#[test]
fn test_state_change_inverse_round_trip() {
    let table = fixture_table();
    let foo: Type = table.resolve(&"Foo".parse().unwrap()).unwrap();
    let mut graph = ruleset_engine::ComponentGraph::new();

    let change = StateChange::new(5, Some(foo.clone()), None).unwrap();
    graph.apply(&change).unwrap();
    assert_eq!(graph.count_exact(&foo), 5);
    graph.apply(&change.inverse()).unwrap();
    assert_eq!(graph.count_exact(&foo), 0);
    assert_eq!(graph.total(), 0);
}

#[test]
fn test_mandatory_removal_over_limit_fails() {
    let mut game = fixture_game();
    game.execute_instruction(&parse("2 Plant!"), owner(), None)
        .unwrap();
    let err = game
        .execute_instruction(&parse("-3 Plant!"), owner(), None)
        .unwrap_err();
    assert!(matches!(
        err,
        ExecutionError::Limits {
            requested: 3,
            possible: 2,
            ..
        }
    ));
    assert_eq!(count_of(&game, "Plant"), 2);
}

#[test]
fn test_amap_removal_clamps() {
    let mut game = fixture_game();
    game.execute_instruction(&parse("2 Plant!"), owner(), None)
        .unwrap();
    game.execute_instruction(&parse("-5 Plant."), owner(), None)
        .unwrap();
    assert_eq!(count_of(&game, "Plant"), 0);
}

#[test]
fn test_transmute() {
    let mut game = fixture_game();
    game.execute_instruction(&parse("3 Energy!"), owner(), None)
        .unwrap();
    game.execute_instruction(&parse("2 Plant FROM Energy!"), owner(), None)
        .unwrap();
    assert_eq!(count_of(&game, "Energy"), 1);
    assert_eq!(count_of(&game, "Plant"), 2);
    // One paired change, not two.
    assert_eq!(game.events().len(), 2);
}

#[test]
fn test_gated_execution() {
    let mut game = fixture_game();
    let err = game
        .execute_instruction(&parse("2 Plant: Energy!"), owner(), None)
        .unwrap_err();
    assert!(matches!(err, ExecutionError::RequirementNotMet(_)));

    // A soft gate quietly does nothing.
    game.execute_instruction(&parse("2 Plant ?: Energy!"), owner(), None)
        .unwrap();
    assert_eq!(count_of(&game, "Energy"), 0);

    game.execute_instruction(&parse("2 Plant!"), owner(), None)
        .unwrap();
    game.execute_instruction(&parse("2 Plant: Energy!"), owner(), None)
        .unwrap();
    assert_eq!(count_of(&game, "Energy"), 1);
}

#[test]
fn test_per_scales_by_current_metric() {
    let mut game = fixture_game();
    game.execute_instruction(&parse("6 Plant!"), owner(), None)
        .unwrap();
    game.execute_instruction(&parse("2 Energy! / 2 Plant"), owner(), None)
        .unwrap();
    assert_eq!(count_of(&game, "Energy"), 6);

    // Metric zero makes the whole thing a no-op.
    game.execute_instruction(&parse("Foo! / Heat"), owner(), None)
        .unwrap();
    assert_eq!(count_of(&game, "Foo"), 0);
}

#[test]
fn test_abstract_gain_is_rejected() {
    let mut game = fixture_game();
    let err = game
        .execute_instruction(&parse("Heat!"), owner(), None)
        .unwrap_err();
    assert!(matches!(err, ExecutionError::AbstractType(_)));

    game.execute_instruction(&parse("Heat<Player2>!"), owner(), None)
        .unwrap();
    assert_eq!(count_of(&game, "Heat"), 1);
    assert_eq!(count_of(&game, "Heat<Player2>"), 1);
    assert_eq!(count_of(&game, "Heat<Player3>"), 0);
    assert_eq!(count_of(&game, "Owned"), 1);
}

// ---------------------------------------------------------------------------
// Tasks and narrowing
// ---------------------------------------------------------------------------

#[test]
fn test_narrow_optional_then_execute() {
    let mut game = fixture_game();
    let ids = game.enqueue(&parse("2 Plant?"), owner(), None).unwrap();
    assert_eq!(ids.len(), 1);
    assert_eq!(game.events().len(), 1);

    game.narrow_task(ids[0], &parse("Plant!")).unwrap();
    assert_eq!(game.task(ids[0]).unwrap().instruction.to_string(), "Plant!");
    assert_eq!(game.events().len(), 2);

    game.execute_task(ids[0]).unwrap();
    assert_eq!(count_of(&game, "Plant"), 1);
    assert!(game.tasks().is_empty());
}

#[test]
fn test_narrowing_to_same_instruction_logs_nothing() {
    let mut game = fixture_game();
    let ids = game.enqueue(&parse("2 Plant?"), owner(), None).unwrap();
    let before = game.events().len();
    game.narrow_task(ids[0], &parse("2 Plant?")).unwrap();
    assert_eq!(game.events().len(), before);
}

#[test]
fn test_narrow_or_to_multi_splits_into_siblings() {
    let mut game = fixture_game();
    let ids = game
        .enqueue(&parse("5 Plant OR (4 Heat, 2 Energy)"), owner(), None)
        .unwrap();
    assert_eq!(ids.len(), 1);

    game.narrow_task(ids[0], &parse("4 Heat, 2 Energy")).unwrap();
    assert!(game.task(ids[0]).is_none());
    let texts: Vec<String> = game
        .tasks()
        .iter()
        .map(|t| t.instruction.to_string())
        .collect();
    assert_eq!(texts, vec!["4 Heat!".to_owned(), "2 Energy!".to_owned()]);
    assert!(game.tasks().ids().all(|sibling| sibling != ids[0]));
}

#[test]
fn test_invalid_narrowing_leaves_everything_unchanged() {
    let mut game = fixture_game();
    let ids = game.enqueue(&parse("2 Plant?"), owner(), None).unwrap();
    let log_len = game.events().len();

    let err = game.narrow_task(ids[0], &parse("3 Plant!")).unwrap_err();
    assert!(matches!(err, ExecutionError::Narrowing(_)));
    assert_eq!(game.task(ids[0]).unwrap().instruction.to_string(), "2 Plant?");
    assert_eq!(game.events().len(), log_len);
}

#[test]
fn test_narrow_to_widened_type_is_rejected() {
    let mut game = fixture_game();
    let ids = game
        .enqueue(&parse("Heat<Player2>!"), owner(), None)
        .unwrap();
    let err = game.narrow_task(ids[0], &parse("Heat!")).unwrap_err();
    assert!(matches!(err, ExecutionError::Narrowing(_)));
}

#[test]
fn test_narrow_optional_to_noop_withdraws_task() {
    let mut game = fixture_game();
    let ids = game.enqueue(&parse("2 Plant?"), owner(), None).unwrap();
    game.narrow_task(ids[0], &parse("Ok")).unwrap();
    assert!(game.tasks().is_empty());
    assert!(matches!(
        game.events().iter().last(),
        Some(GameEvent::TaskRemoved(_))
    ));
}

#[test]
fn test_then_defers_tail() {
    let mut game = fixture_game();
    let ids = game
        .enqueue(&parse("Plant! THEN Energy!"), owner(), None)
        .unwrap();
    assert_eq!(ids.len(), 1);
    assert_eq!(game.task(ids[0]).unwrap().instruction.to_string(), "Plant!");

    game.execute_task(ids[0]).unwrap();
    assert_eq!(count_of(&game, "Plant"), 1);
    assert_eq!(count_of(&game, "Energy"), 0);

    let follow_up = game.tasks().ids().next().unwrap();
    assert_eq!(
        game.task(follow_up).unwrap().instruction.to_string(),
        "Energy!"
    );
    game.execute_task(follow_up).unwrap();
    assert_eq!(count_of(&game, "Energy"), 1);
    assert!(game.tasks().is_empty());
}

#[test]
fn test_multi_enqueues_sibling_tasks() {
    let mut game = fixture_game();
    let ids = game
        .enqueue(&parse("2 Plant!, Energy!"), owner(), None)
        .unwrap();
    assert_eq!(ids.len(), 2);
}

#[test]
fn test_unresolved_or_cannot_execute() {
    let mut game = fixture_game();
    let ids = game
        .enqueue(&parse("Plant! OR Energy!"), owner(), None)
        .unwrap();
    let err = game.execute_task(ids[0]).unwrap_err();
    assert!(matches!(err, ExecutionError::UnresolvedChoice(_)));
    assert!(game.task(ids[0]).is_some());
}

#[test]
fn test_or_collapsed_to_abstract_arm_does_not_execute() {
    let mut game = fixture_game();

    // Only the optional arm survives an empty board; it is still a choice.
    let err = game
        .execute_instruction(&parse("2 Plant? OR -1 Energy!"), owner(), None)
        .unwrap_err();
    assert!(matches!(err, ExecutionError::AbstractInstruction(_)));
    assert_eq!(count_of(&game, "Plant"), 0);
    assert!(game.events().is_empty());

    // Same with an arm whose type is still abstract.
    let err = game
        .execute_instruction(&parse("Heat! OR -1 Energy!"), owner(), None)
        .unwrap_err();
    assert!(matches!(err, ExecutionError::AbstractType(_)));
    assert!(game.events().is_empty());
}

#[test]
fn test_drop_task() {
    let mut game = fixture_game();
    let ids = game.enqueue(&parse("2 Plant?"), owner(), None).unwrap();
    game.drop_task(ids[0]).unwrap();
    assert!(game.tasks().is_empty());
    assert!(matches!(
        game.drop_task(ids[0]),
        Err(ExecutionError::UnknownTask(_))
    ));
}

// ---------------------------------------------------------------------------
// Checkpoints and rollback
// ---------------------------------------------------------------------------

#[test]
fn test_rollback_restores_counts_and_log() {
    let mut game = fixture_game();
    game.execute_instruction(&parse("5 Plant!"), owner(), None)
        .unwrap();
    let checkpoint = game.checkpoint();

    game.execute_instruction(&parse("2 Plant!, 3 Energy!"), owner(), None)
        .unwrap();
    assert_eq!(count_of(&game, "Plant"), 7);

    game.roll_back(checkpoint);
    assert_eq!(count_of(&game, "Plant"), 5);
    assert_eq!(count_of(&game, "Energy"), 0);
    assert_eq!(game.events().len(), 1);
}

#[test]
fn test_failed_task_execution_rolls_back() {
    let mut game = fixture_game();
    game.execute_instruction(&parse("Plant!"), owner(), None)
        .unwrap();
    // The gate passes and the first part lands, then the removal fails; the
    // whole attempt must unwind and leave the task queued.
    let ids = game
        .enqueue(&parse("Plant: (2 Energy!, -3 Plant!)"), owner(), None)
        .unwrap();
    assert_eq!(ids.len(), 1);

    let err = game.execute_task(ids[0]).unwrap_err();
    assert!(matches!(err, ExecutionError::Limits { .. }));
    assert_eq!(count_of(&game, "Energy"), 0);
    assert_eq!(count_of(&game, "Plant"), 1);
    assert!(game.task(ids[0]).is_some());
    assert_eq!(game.events().len(), 2);
}

#[test]
fn test_atomic_unwinds_partial_multi() {
    let mut game = fixture_game();
    let result = game.atomic(|g| {
        g.execute_instruction(&parse("2 Plant!, -1 Energy!"), owner(), None)
    });
    assert!(result.is_err());
    assert_eq!(count_of(&game, "Plant"), 0);
    assert!(game.events().is_empty());
}

#[test]
fn test_multi_without_atomic_keeps_completed_parts() {
    let mut game = fixture_game();
    let err = game
        .execute_instruction(&parse("2 Plant!, -1 Energy!"), owner(), None)
        .unwrap_err();
    assert!(matches!(err, ExecutionError::Limits { .. }));
    assert_eq!(count_of(&game, "Plant"), 2);
}

#[test]
fn test_rollback_restores_queue_shape() {
    let mut game = fixture_game();
    let ids = game.enqueue(&parse("2 Plant?"), owner(), None).unwrap();
    let checkpoint = game.checkpoint();

    game.narrow_task(ids[0], &parse("Plant!")).unwrap();
    game.execute_task(ids[0]).unwrap();
    assert!(game.tasks().is_empty());

    game.roll_back(checkpoint);
    assert_eq!(game.task(ids[0]).unwrap().instruction.to_string(), "2 Plant?");
    assert_eq!(count_of(&game, "Plant"), 0);
}

// ---------------------------------------------------------------------------
// Class effects
// ---------------------------------------------------------------------------

fn effect_game() -> Game {
    let mut builder = ClassTableBuilder::new();
    for resource in ["Plant", "Heat", "Energy"] {
        builder
            .declare(
                ClassDeclaration::new(resource).with_default_gain_intensity(Intensity::Mandatory),
            )
            .unwrap();
    }
    builder
        .declare(ClassDeclaration::new("Greenhouse").with_effect(Effect {
            trigger: Trigger::OnGain(Expression::name("Plant")),
            automatic: true,
            instruction: parse("2 Heat!"),
        }))
        .unwrap();
    builder
        .declare(ClassDeclaration::new("Insurance").with_effect(Effect {
            trigger: Trigger::OnRemove(Expression::name("Energy")),
            automatic: false,
            instruction: parse("Heat!"),
        }))
        .unwrap();
    builder
        .declare(ClassDeclaration::new("Beacon").with_effect(Effect {
            trigger: Trigger::OnGain(Expression::name("Beacon")),
            automatic: true,
            instruction: parse("Plant!"),
        }))
        .unwrap();
    Game::new(builder.freeze().unwrap())
}

#[test]
fn test_automatic_effect_fires_per_listener() {
    let mut game = effect_game();
    game.execute_instruction(&parse("3 Plant!"), owner(), None)
        .unwrap();
    assert_eq!(count_of(&game, "Heat"), 0);

    game.execute_instruction(&parse("Greenhouse!"), owner(), None)
        .unwrap();
    game.execute_instruction(&parse("2 Plant!"), owner(), None)
        .unwrap();
    assert_eq!(count_of(&game, "Heat"), 4);

    match game.events().iter().last().unwrap() {
        GameEvent::Change {
            change,
            cause: Some(cause),
            ..
        } => {
            assert_eq!(change.count, 4);
            assert_eq!(cause.context.to_string(), "Greenhouse");
            assert_eq!(cause.trigger_event, Some(2));
        }
        other => panic!("expected a caused change, got {other:?}"),
    }
}

#[test]
fn test_queued_effect_enqueues_task_with_cause() {
    let mut game = effect_game();
    game.execute_instruction(&parse("Insurance!"), owner(), None)
        .unwrap();
    game.execute_instruction(&parse("2 Energy!"), owner(), None)
        .unwrap();
    assert!(game.tasks().is_empty());

    game.execute_instruction(&parse("-1 Energy!"), owner(), None)
        .unwrap();
    assert_eq!(count_of(&game, "Heat"), 0);
    let (id, text, context) = {
        let task = game.tasks().iter().next().unwrap();
        (
            task.id,
            task.instruction.to_string(),
            task.cause.clone().unwrap().context.to_string(),
        )
    };
    assert_eq!(text, "Heat!");
    assert_eq!(context, "Insurance");

    game.execute_task(id).unwrap();
    assert_eq!(count_of(&game, "Heat"), 1);
}

#[test]
fn test_component_notices_its_own_arrival() {
    let mut game = effect_game();
    game.execute_instruction(&parse("Beacon!"), owner(), None)
        .unwrap();
    assert_eq!(count_of(&game, "Plant"), 1);

    // The second beacon fires for itself, and the first one hears it too.
    game.execute_instruction(&parse("Beacon!"), owner(), None)
        .unwrap();
    assert_eq!(count_of(&game, "Plant"), 3);
}

// ---------------------------------------------------------------------------
// Custom instructions and transforms
// ---------------------------------------------------------------------------

struct GrantOne;

impl CustomInstruction for GrantOne {
    fn name(&self) -> &str {
        "grantOne"
    }

    fn translate(
        &self,
        _reader: &dyn GameReader,
        _args: &[Type],
    ) -> Result<Translation, ExecutionError> {
        Ok(Translation::ExecuteDirect)
    }

    fn apply(&self, writer: &mut dyn GameWriter, args: &[Type]) -> Result<(), ExecutionError> {
        writer.apply_change(1, Some(args[0].clone()), None)
    }
}

struct DoubleDown;

impl CustomInstruction for DoubleDown {
    fn name(&self) -> &str {
        "doubleDown"
    }

    fn translate(
        &self,
        reader: &dyn GameReader,
        args: &[Type],
    ) -> Result<Translation, ExecutionError> {
        let present = reader.count(&args[0]);
        let expr = reader.table().expression_of(&args[0]);
        Ok(Translation::Replace(
            format!("{present} {expr}!").parse().unwrap(),
        ))
    }
}

#[test]
fn test_custom_execute_direct() {
    let mut registry = CustomRegistry::new();
    registry.register(Box::new(GrantOne));
    let mut game = Game::new(fixture_table()).with_customs(registry);

    game.execute_instruction(&parse("@grantOne(Plant)"), owner(), None)
        .unwrap();
    assert_eq!(count_of(&game, "Plant"), 1);
}

#[test]
fn test_custom_translation_is_replayed_like_text() {
    let mut registry = CustomRegistry::new();
    registry.register(Box::new(DoubleDown));
    let mut game = Game::new(fixture_table()).with_customs(registry);

    game.execute_instruction(&parse("3 Energy!"), owner(), None)
        .unwrap();
    game.execute_instruction(&parse("@doubleDown(Energy)"), owner(), None)
        .unwrap();
    assert_eq!(count_of(&game, "Energy"), 6);
}

#[test]
fn test_unregistered_custom_fails() {
    let mut game = fixture_game();
    let err = game
        .execute_instruction(&parse("@missing(Plant)"), owner(), None)
        .unwrap_err();
    assert!(matches!(err, ExecutionError::UnknownCustom(_)));
}

fn production_game() -> Game {
    let mut builder = ClassTableBuilder::new();
    builder
        .declare(ClassDeclaration::new("Producible").with_abstract())
        .unwrap();
    builder
        .declare(ClassDeclaration::new("Steel").with_supertype(Expression::name("Producible")))
        .unwrap();
    builder
        .declare(
            ClassDeclaration::new("Production")
                .with_dependency("Class<Producible>".parse().unwrap()),
        )
        .unwrap();
    let table = builder.freeze().unwrap();
    Game::new(table).with_transformers(Transformers::new().with_production(
        "PROD",
        ClassName::new("Production"),
        ClassName::new("Producible"),
    ))
}

#[test]
fn test_prod_bracket_rewrites_to_production_components() {
    let mut game = production_game();
    game.execute_instruction(&parse("PROD[2 Steel!]"), owner(), None)
        .unwrap();
    assert_eq!(count_of(&game, "Production<Class<Steel>>"), 2);
    assert_eq!(count_of(&game, "Steel"), 0);
}

#[test]
fn test_unknown_transform_is_rejected() {
    let mut game = fixture_game();
    let err = game
        .execute_instruction(&parse("PROD[2 Plant!]"), owner(), None)
        .unwrap_err();
    assert!(matches!(err, ExecutionError::UnknownTransform(_)));
}
