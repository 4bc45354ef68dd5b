//! Porter Headless Simulation Harness
//!
//! Drives carry sessions against the in-memory scene and checks the
//! invariants that must hold on every frame. No engine, no rendering.
//!
//! Usage:
//!   cargo run -p porter-simtest
//!   cargo run -p porter-simtest -- --verbose
//!   cargo run -p porter-simtest -- --config tuning.json --seed 7

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use glam::Vec3;
use porter_logic::balance::BalanceBand;
use porter_logic::cargo::CargoItem;
use porter_logic::config::{validate_config, PorterConfig};
use porter_logic::events::{DropCause, PorterEvent};
use porter_logic::fragile::{CargoState, FragileCargo};
use porter_logic::input::ScriptedInput;
use porter_logic::porter::Porter;
use porter_logic::scene::{SceneGraph, SimScene};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

const DT: f32 = 1.0 / 60.0;
const DEFAULT_SEED: u64 = 42;

// ── Stacking scenario (picked up in order) ──────────────────────────────
const STACK_LOADS_JSON: &str = r#"[
    { "id": "sack", "weight": 8.0 },
    { "id": "crate", "weight": 20.0 },
    { "id": "barrel", "weight": 14.0 },
    { "id": "chest", "weight": 20.0, "fragile": true },
    { "id": "jar", "weight": 3.0, "fragile": true }
]"#;

#[derive(Debug, Deserialize)]
struct StackLoad {
    id: String,
    weight: f32,
    #[serde(default)]
    fragile: bool,
}

type SimPorter = Porter<SimScene, ScriptedInput>;

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

impl TestResult {
    fn check(name: &str, passed: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed,
            detail: detail.into(),
        }
    }
}

struct Options {
    verbose: bool,
    config_path: Option<String>,
    seed: u64,
}

fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let value_after = |flag: &str| {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .cloned()
    };
    Options {
        verbose: args.iter().any(|a| a == "--verbose"),
        config_path: value_after("--config"),
        seed: value_after("--seed")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SEED),
    }
}

fn main() {
    let opts = parse_args();
    let default_filter = if opts.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    println!("=== Porter Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Configuration
    let config = match load_config(opts.config_path.as_deref()) {
        Ok(config) => config,
        Err(detail) => {
            println!("  ✗ config_load: {}", detail);
            std::process::exit(1);
        }
    };
    results.extend(validate_configuration(&config));

    // 2. Capacity gate
    results.extend(validate_capacity(&config));

    // 3. Stacking and reorganize
    results.extend(validate_stacking(&config, opts.verbose));

    // 4. Balance recovery and falls
    results.extend(validate_balance(&config));

    // 5. Randomised soak
    results.extend(validate_soak(&config, opts.seed, opts.verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || opts.verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn load_config(path: Option<&str>) -> Result<PorterConfig, String> {
    let Some(path) = path else {
        return Ok(PorterConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path, e))?;
    serde_json::from_str(&text).map_err(|e| format!("{}: {}", path, e))
}

fn new_porter(config: &PorterConfig) -> Option<SimPorter> {
    let mut scene = SimScene::new();
    let anchor = scene.spawn_marker(Vec3::new(0.0, 1.5, 0.0));
    match Porter::new(config.clone(), scene, ScriptedInput::idle(), anchor) {
        Ok(porter) => Some(porter),
        Err(e) => {
            log::error!("{}", e);
            None
        }
    }
}

fn spawn_item(porter: &mut SimPorter, id: &str, weight: f32, size: Vec3) -> CargoItem {
    let node = porter
        .scene_mut()
        .spawn(Vec3::new(2.5, size.y * 0.5, 0.0), size, 1);
    CargoItem::new(id, id, node, weight)
}

/// Pick up and let the mount land.
fn pick(porter: &mut SimPorter, id: &str, weight: f32) -> bool {
    let item = spawn_item(porter, id, weight, Vec3::ONE);
    let picked = porter.pickup(item).unwrap_or(false);
    let landing = porter.config().mount_duration + 0.1;
    run(porter, landing);
    picked
}

fn run(porter: &mut SimPorter, seconds: f32) {
    let ticks = (seconds / DT).ceil() as usize;
    for _ in 0..ticks {
        porter.tick(DT);
    }
}

fn event_name(event: &PorterEvent) -> &'static str {
    match event {
        PorterEvent::BalanceChanged { .. } => "balance_changed",
        PorterEvent::WeightChanged { .. } => "weight_changed",
        PorterEvent::CriticalChanged { .. } => "critical_changed",
        PorterEvent::CargoDamaged { .. } => "cargo_damaged",
        PorterEvent::CargoDropped { .. } => "cargo_dropped",
        PorterEvent::FragileSecured { .. } => "fragile_secured",
        PorterEvent::FragileReleased { .. } => "fragile_released",
        PorterEvent::FallStarted { .. } => "fall_started",
        PorterEvent::FallRecovered { .. } => "fall_recovered",
    }
}

fn missing_porter(name: &str) -> Vec<TestResult> {
    vec![TestResult::check(name, false, "porter could not be built")]
}

// ── 1. Configuration ────────────────────────────────────────────────────

fn validate_configuration(config: &PorterConfig) -> Vec<TestResult> {
    println!("--- Configuration ---");
    let issues = validate_config(config);
    let detail = if issues.is_empty() {
        format!(
            "capacity {:.0}kg, max balance {:.0}, fall at {:.0}",
            config.max_carry_weight, config.max_balance, config.balance_fall_threshold
        )
    } else {
        issues
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    };
    vec![TestResult::check("config_valid", issues.is_empty(), detail)]
}

// ── 2. Capacity ─────────────────────────────────────────────────────────

fn validate_capacity(config: &PorterConfig) -> Vec<TestResult> {
    println!("--- Capacity ---");
    let Some(mut porter) = new_porter(config) else {
        return missing_porter("capacity_porter");
    };
    let mut results = Vec::new();

    let half = config.max_carry_weight * 0.5;
    let first = pick(&mut porter, "a", half * 0.8);
    let second = pick(&mut porter, "b", half * 0.8);
    let third = pick(&mut porter, "c", half * 0.5);
    results.push(TestResult::check(
        "capacity_gate",
        first && second && !third,
        format!(
            "admitted {}/{}/{} at {:.1}/{:.1}kg",
            first,
            second,
            third,
            porter.inventory().current_weight(),
            config.max_carry_weight
        ),
    ));

    let before = porter.inventory().len();
    let mut ghost = spawn_item(&mut porter, "ghost", 1.0, Vec3::ONE);
    ghost.node = None;
    let rejected = porter.pickup(ghost).is_err();
    results.push(TestResult::check(
        "invalid_cargo_rejected",
        rejected && porter.inventory().len() == before,
        format!("error returned: {}", rejected),
    ));

    results
}

// ── 3. Stacking ─────────────────────────────────────────────────────────

fn validate_stacking(config: &PorterConfig, verbose: bool) -> Vec<TestResult> {
    println!("--- Stacking ---");
    let Some(mut porter) = new_porter(config) else {
        return missing_porter("stacking_porter");
    };
    let mut results = Vec::new();

    let loads: Vec<StackLoad> = match serde_json::from_str(STACK_LOADS_JSON) {
        Ok(loads) => loads,
        Err(e) => {
            results.push(TestResult::check(
                "stack_scenario_parse",
                false,
                format!("JSON parse error: {}", e),
            ));
            return results;
        }
    };
    for load in &loads {
        if load.fragile {
            porter.register_fragile(FragileCargo::new(load.id.as_str()));
        }
        let item = spawn_item(&mut porter, &load.id, load.weight, Vec3::ONE).with_fragile(load.fragile);
        if let Err(e) = porter.pickup(item) {
            log::warn!("{}", e);
        }
        run(&mut porter, config.mount_duration + 0.1);
    }
    let fragile: Vec<_> = loads.iter().filter(|l| l.fragile).collect();
    let secured = fragile
        .iter()
        .filter(|l| porter.fragile_cargo(&l.id).is_some_and(|f| f.state == CargoState::Mounted))
        .count();
    results.push(TestResult::check(
        "stack_fragile_secured",
        secured == fragile.len(),
        format!("{}/{} fragile items mounted", secured, fragile.len()),
    ));

    let step = 1.0 + config.stack_spacing;
    let slots_ok = porter
        .inventory()
        .items()
        .iter()
        .enumerate()
        .all(|(i, item)| (item.local_mount_position.y - i as f32 * step).abs() < 1e-3);
    results.push(TestResult::check(
        "stack_bottom_up",
        slots_ok,
        format!("{} items, stack {:.2} tall", porter.inventory().len(), porter.inventory().stack_height()),
    ));

    let scene = porter.scene();
    let nodes: Vec<_> = porter.inventory().items().iter().filter_map(|i| i.node).collect();
    let overlaps = nodes
        .iter()
        .enumerate()
        .flat_map(|(i, a)| nodes[i + 1..].iter().map(move |b| (*a, *b)))
        .filter(|(a, b)| scene.bounds(*a).overlaps(&scene.bounds(*b)))
        .count();
    results.push(TestResult::check(
        "stack_no_overlap",
        overlaps == 0,
        format!("{} overlapping pairs", overlaps),
    ));

    let _ = porter.drop("jar");
    run(&mut porter, config.reorganize_settle_delay + config.reorganize_duration + 0.2);
    let order: Vec<&str> = porter.inventory().items().iter().map(|i| i.id.as_str()).collect();
    results.push(TestResult::check(
        "reorganize_heaviest_first",
        order == ["crate", "chest", "barrel", "sack"],
        format!("{:?}", order),
    ));

    if verbose {
        if let Ok(json) = serde_json::to_string_pretty(porter.inventory().items()) {
            println!("{}", json);
        }
    }

    results
}

// ── 4. Balance ──────────────────────────────────────────────────────────

fn validate_balance(config: &PorterConfig) -> Vec<TestResult> {
    println!("--- Balance ---");
    let mut results = Vec::new();

    // Stationary recovery
    let Some(mut porter) = new_porter(config) else {
        return missing_porter("balance_porter");
    };
    porter.reduce_balance(config.max_balance * 0.5);
    let mut last = porter.balance().balance();
    let mut monotonic = true;
    for _ in 0..(3.0 / DT) as usize {
        porter.tick(DT);
        let now = porter.balance().balance();
        if now < last || now > config.max_balance {
            monotonic = false;
        }
        last = now;
    }
    results.push(TestResult::check(
        "stationary_recovery",
        monotonic && last == config.max_balance && porter.balance_state().recovering,
        format!("balance {:.2} ({})", last, porter.balance_state()),
    ));

    // Fall sheds the heaviest items
    let Some(mut porter) = new_porter(config) else {
        return missing_porter("fall_porter");
    };
    let weights = [10.0, 20.0, 30.0, 40.0, 5.0];
    for (i, w) in weights.iter().enumerate() {
        pick(&mut porter, &format!("load-{}", i), *w);
    }
    let dropped = Rc::new(RefCell::new(Vec::new()));
    let sink = dropped.clone();
    porter.subscribe(move |e| {
        if let PorterEvent::CargoDropped {
            cargo_id,
            cause: DropCause::Fall,
        } = e
        {
            sink.borrow_mut().push(cargo_id.clone());
        }
    });
    porter.reduce_balance(config.max_balance);
    let tick = porter.tick(DT);
    let expected = config.max_balance * config.fall_restore_fraction;
    results.push(TestResult::check(
        "fall_sequence",
        tick.fall_triggered
            && porter.balance().balance() == expected
            && !porter.balance().movement_enabled(),
        format!(
            "dropped {:?}, balance restored to {:.1}",
            dropped.borrow(),
            porter.balance().balance()
        ),
    ));

    // Speed modifier floor
    let multiplier = porter.apply_movement_modifiers();
    results.push(TestResult::check(
        "movement_multiplier_range",
        (0.1..=1.0).contains(&multiplier),
        format!("{:.3} at {:.1}kg", multiplier, porter.inventory().current_weight()),
    ));

    results
}

// ── 5. Soak ─────────────────────────────────────────────────────────────

fn validate_soak(config: &PorterConfig, seed: u64, verbose: bool) -> Vec<TestResult> {
    println!("--- Soak (seed {}) ---", seed);
    let Some(mut porter) = new_porter(config) else {
        return missing_porter("soak_porter");
    };
    let mut rng = StdRng::seed_from_u64(seed);
    let mut results = Vec::new();

    let counts = Rc::new(RefCell::new(BTreeMap::<&'static str, usize>::new()));
    let sink = counts.clone();
    porter.subscribe(move |e| *sink.borrow_mut().entry(event_name(e)).or_default() += 1);

    let mut violations = Vec::new();
    let mut next_id = 0;
    let directions = [Vec3::X, Vec3::NEG_X, Vec3::Z, Vec3::NEG_Z, Vec3::new(0.7, 0.0, 0.7)];

    for frame in 0..6000 {
        if rng.gen_bool(0.02) {
            next_id += 1;
            let size = Vec3::new(
                rng.gen_range(0.5..1.2),
                rng.gen_range(0.3..1.0),
                rng.gen_range(0.5..1.2),
            );
            let weight = rng.gen_range(1.0..45.0);
            let item = spawn_item(&mut porter, &format!("soak-{}", next_id), weight, size)
                .with_fragile(rng.gen_bool(0.2));
            if let Err(e) = porter.pickup(item) {
                violations.push(format!("frame {}: pickup failed: {}", frame, e));
            }
        }
        if rng.gen_bool(0.01) && !porter.inventory().is_empty() {
            let index = rng.gen_range(0..porter.inventory().len());
            let id = porter.inventory().items()[index].id.clone();
            if let Err(e) = porter.drop(&id) {
                violations.push(format!("frame {}: drop failed: {}", frame, e));
            }
        }
        if frame % 120 == 0 {
            *porter.input_mut() = if rng.gen_bool(0.6) {
                let dir = directions[rng.gen_range(0..directions.len())];
                ScriptedInput::walking(dir, rng.gen_range(1.0..5.0))
            } else {
                ScriptedInput::idle()
            };
        }

        porter.tick(DT);

        let inv = porter.inventory();
        let sum: f32 = inv.items().iter().map(|i| i.weight).sum();
        if (inv.current_weight() - sum).abs() > 1e-2 {
            violations.push(format!("frame {}: weight {} != sum {}", frame, inv.current_weight(), sum));
        }
        if inv.current_weight() > inv.max_weight() + 1e-3 {
            violations.push(format!("frame {}: over capacity {:.2}", frame, inv.current_weight()));
        }
        let balance = porter.balance().balance();
        if !(0.0..=config.max_balance).contains(&balance) {
            violations.push(format!("frame {}: balance {} out of range", frame, balance));
        }
    }

    *porter.input_mut() = ScriptedInput::idle();
    run(&mut porter, 3.0);
    let scene = porter.scene();
    let anchor = porter.inventory().anchor();
    let landed = porter.inventory().items().iter().all(|item| {
        item.node.is_some_and(|n| {
            scene.parent(n) == Some(anchor)
                && (scene.local_position(n) - item.local_mount_position).length() < 1e-3
        })
    });

    let counts = counts.borrow();
    if verbose {
        for (name, count) in counts.iter() {
            println!("    {:>18}: {}", name, count);
        }
    }

    results.push(TestResult::check(
        "soak_invariants",
        violations.is_empty(),
        violations
            .first()
            .cloned()
            .unwrap_or_else(|| "weight, capacity and balance held every frame".into()),
    ));
    results.push(TestResult::check(
        "soak_items_landed",
        landed && porter.transitions().is_empty(),
        format!(
            "{} items carried, {} falls",
            porter.inventory().len(),
            counts.get("fall_started").copied().unwrap_or(0)
        ),
    ));
    results.push(TestResult::check(
        "soak_settled_band",
        porter.balance_state().band != BalanceBand::Falling,
        format!("{}", porter.balance_state()),
    ));

    results
}
