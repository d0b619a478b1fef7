mod common;

use ghx_dungeon_gen::{
    layout::DoorState,
    wfc::node_heuristic::NodeSelectionHeuristic,
    DungeonGenerator, GenerationParameters,
};
use proptest::prelude::*;

use common::{check_layout, check_tile_edges, crypt_catalog, generate, init_tracing};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]
    #[test]
    fn partition_layouts_hold_their_invariants(
        seed in any::<u64>(),
        width in 24_u32..=64,
        height in 20_u32..=48,
        levels in 1_u32..=3,
        density in 0.2_f32..=0.9,
        extra_ratio in 0_f32..=0.6
    ) {
        let parameters = GenerationParameters::builder()
            .with_grid_size(width, height)
            .with_levels(levels)
            .with_room_size(3, 7)
            .with_room_density(density)
            .with_extra_connections_ratio(extra_ratio)
            .with_seed(seed)
            .build()
            .unwrap();
        let layout = generate(parameters);

        prop_assert_eq!(layout.levels.len(), levels as usize);
        if let Err(violation) = check_layout(&layout) {
            return Err(TestCaseError::fail(violation));
        }
    }

    #[test]
    fn tile_layouts_have_compatible_edges(seed in any::<u64>(), entropy in any::<bool>()) {
        let catalog = crypt_catalog();
        let heuristic = match entropy {
            true => NodeSelectionHeuristic::MinimumEntropy,
            false => NodeSelectionHeuristic::MinimumRemainingValue,
        };
        let parameters = GenerationParameters::builder()
            .with_grid_size(30, 21)
            .with_room_size(2, 5)
            .with_tile_catalog("crypt")
            .with_seed(seed)
            .build()
            .unwrap();
        let layout = DungeonGenerator::builder()
            .with_parameters(parameters)
            .with_catalog(catalog.clone())
            .with_node_heuristic(heuristic)
            .build()
            .unwrap()
            .generate()
            .unwrap();

        let level = &layout.levels[0];
        let checked = check_tile_edges(level, &catalog).and_then(|_| check_layout(&layout));
        if let Err(violation) = checked {
            return Err(TestCaseError::fail(violation));
        }
    }
}

#[test]
fn same_parameters_give_identical_bytes() {
    init_tracing();
    let catalog = crypt_catalog();
    for parameters in [
        GenerationParameters::builder()
            .with_levels(3)
            .with_seed(1234)
            .build()
            .unwrap(),
        GenerationParameters::builder()
            .with_grid_size(30, 21)
            .with_room_size(2, 5)
            .with_tile_catalog("crypt")
            .with_seed(1234)
            .build()
            .unwrap(),
    ] {
        let generator = DungeonGenerator::builder()
            .with_parameters(parameters)
            .with_catalog(catalog.clone())
            .build()
            .unwrap();
        let first = generator.generate().unwrap().to_json().unwrap();
        let second = generator.generate().unwrap().to_json().unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn generator_is_shared_between_threads() {
    let generator = DungeonGenerator::builder()
        .with_parameters(
            GenerationParameters::builder()
                .with_levels(2)
                .with_seed(77)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();
    let expected = generator.generate().unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| generator.generate().unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn secret_door_fraction_matches_the_ratio() {
    let ratio = 0.2;
    let (mut secret, mut candidates) = (0_usize, 0_usize);
    for seed in 0..500 {
        let layout = generate(
            GenerationParameters::builder()
                .with_grid_size(32, 24)
                .with_secret_door_ratio(ratio)
                .with_seed(seed)
                .build()
                .unwrap(),
        );
        for door in layout.levels.iter().flat_map(|level| &level.doors) {
            if door.state != DoorState::Locked {
                candidates += 1;
                secret += usize::from(door.is_secret());
            }
        }
    }

    assert!(candidates > 0);
    let observed = secret as f64 / candidates as f64;
    assert!(
        (observed - f64::from(ratio)).abs() <= 0.03,
        "observed secret fraction {observed} over {candidates} doors"
    );
}
