mod common;

use ghx_dungeon_gen::{
    layout::{DoorState, RoomKind},
    DungeonGenerator, GenerationParameters, GeneratorError, LevelFailure,
};

use common::{check_layout, check_stairs, check_tile_edges, crypt_catalog, generate, init_tracing};

fn small_parameters(seed: u64) -> GenerationParameters {
    GenerationParameters::builder()
        .with_grid_size(20, 20)
        .with_levels(1)
        .with_room_size(2, 6)
        .with_room_density(0.3)
        .with_seed(seed)
        .build()
        .unwrap()
}

#[test]
fn small_single_level_is_connected_without_overlaps() {
    init_tracing();
    let layout = generate(small_parameters(42));

    assert_eq!(layout.levels.len(), 1);
    let level = &layout.levels[0];
    assert!(!level.rooms.is_empty());
    assert_eq!(level.rooms[0].kind, RoomKind::Entry);
    check_layout(&layout).unwrap();
}

#[test]
fn another_seed_gives_another_layout() {
    init_tracing();
    let first = generate(small_parameters(42));
    let second = generate(small_parameters(43));

    check_layout(&second).unwrap();
    assert_ne!(first.levels[0], second.levels[0]);
}

#[test]
fn every_level_pair_is_linked_by_stairs() {
    init_tracing();
    let parameters = GenerationParameters::builder()
        .with_levels(3)
        .with_seed(7)
        .build()
        .unwrap();
    let layout = generate(parameters);

    assert_eq!(layout.levels.len(), 3);
    check_stairs(&layout).unwrap();
    check_layout(&layout).unwrap();
    // Only the deepest level has an exit
    assert!(layout.exits.iter().all(|exit| exit.level == -2));
    for stair in layout.levels.iter().flat_map(|level| &level.stairs) {
        assert!((stair.from_level - stair.to_level).abs() == 1);
    }
}

#[test]
fn tiny_tile_grid_collapses_or_falls_back() {
    init_tracing();
    let catalog = crypt_catalog();
    for seed in 0..20 {
        let parameters = GenerationParameters::builder()
            .with_grid_size(9, 9)
            .with_room_size(2, 4)
            .with_tile_catalog("crypt")
            .with_seed(seed)
            .build()
            .unwrap();
        let layout = DungeonGenerator::builder()
            .with_parameters(parameters)
            .with_catalog(catalog.clone())
            .with_wfc_budget(64, 8)
            .build()
            .unwrap()
            .generate()
            .unwrap();

        let level = &layout.levels[0];
        if let Some(tiles) = &level.tiles {
            assert_eq!((tiles.columns, tiles.rows), (3, 3));
            check_tile_edges(level, &catalog).unwrap();
        }
        check_layout(&layout).unwrap();
    }
}

#[test]
fn exhausted_collapse_falls_back_to_partition() {
    init_tracing();
    let parameters = GenerationParameters::builder()
        .with_grid_size(30, 21)
        .with_room_size(2, 5)
        .with_tile_catalog("crypt")
        .with_seed(3)
        .build()
        .unwrap();
    let layout = DungeonGenerator::builder()
        .with_parameters(parameters)
        .with_catalog(crypt_catalog())
        .with_wfc_budget(1, 0)
        .build()
        .unwrap()
        .generate()
        .unwrap();

    let level = &layout.levels[0];
    assert!(level.tiles.is_none());
    assert!(!level.rooms.is_empty());
    check_layout(&layout).unwrap();
}

#[test]
fn oversized_rooms_exhaust_generation() {
    init_tracing();
    let parameters = GenerationParameters::builder()
        .with_grid_size(10, 10)
        .with_room_size(12, 14)
        .with_seed(1)
        .build()
        .unwrap();
    let err = DungeonGenerator::builder()
        .with_parameters(parameters.clone())
        .build()
        .unwrap()
        .generate()
        .unwrap_err();

    match err {
        GeneratorError::GenerationExhausted {
            parameters: failed,
            attempts,
            last_failure,
        } => {
            assert_eq!(*failed, parameters);
            assert_eq!(attempts, 8);
            assert!(matches!(last_failure, LevelFailure::RoomSynthesis { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn parameters_from_json_fill_in_defaults() {
    let parameters =
        GenerationParameters::from_json(r#"{"width": 30, "height": 24, "seed": 5}"#).unwrap();
    assert_eq!(parameters.levels, 1);
    let layout = generate(parameters);
    check_layout(&layout).unwrap();

    let document = layout.to_document().unwrap();
    assert_eq!(document["seed"], 5);
    assert!(document["levels"][0]["rooms"].is_array());
}

#[test]
fn locked_doors_carry_a_difficulty() {
    let layout = generate(
        GenerationParameters::builder()
            .with_levels(2)
            .with_seed(99)
            .build()
            .unwrap(),
    );
    for door in layout.levels.iter().flat_map(|level| &level.doors) {
        match door.state {
            DoorState::Locked => {
                assert!(door
                    .lock_difficulty
                    .is_some_and(|difficulty| (10..=25).contains(&difficulty)));
                assert!(!door.is_secret());
            }
            _ => assert!(door.lock_difficulty.is_none()),
        }
    }
}
