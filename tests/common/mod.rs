//! Shared test fixture: a small game world.
//!
//! - `Foo`: concrete, no dependencies
//! - `Player` (abstract) with `Player1`..`Player3`
//! - `Owned<Player>` (abstract) and `Heat : Owned<Player>`
//! - `Plant`, `Energy`: concrete resources with a `!` gain default

use ruleset_engine::{ClassDeclaration, ClassTable, ClassTableBuilder, Expression, Game, Intensity};

#[must_use]
pub fn fixture_table() -> ClassTable {
    let mut builder = ClassTableBuilder::new();
    builder.declare(ClassDeclaration::new("Foo")).unwrap();
    builder
        .declare(ClassDeclaration::new("Player").with_abstract())
        .unwrap();
    for player in ["Player1", "Player2", "Player3"] {
        builder
            .declare(ClassDeclaration::new(player).with_supertype(Expression::name("Player")))
            .unwrap();
    }
    builder
        .declare(
            ClassDeclaration::new("Owned")
                .with_abstract()
                .with_dependency(Expression::name("Player")),
        )
        .unwrap();
    builder
        .declare(
            ClassDeclaration::new("Heat")
                .with_supertype(Expression::of("Owned", vec![Expression::name("Player")]))
                .with_default_gain_intensity(Intensity::Mandatory),
        )
        .unwrap();
    for resource in ["Plant", "Energy"] {
        builder
            .declare(
                ClassDeclaration::new(resource)
                    .with_default_gain_intensity(Intensity::Mandatory),
            )
            .unwrap();
    }
    builder.freeze().unwrap()
}

#[must_use]
pub fn fixture_game() -> Game {
    Game::new(fixture_table())
}
