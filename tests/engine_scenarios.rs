//! End-to-end behaviour of the layout engine against the in-memory window system

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use ultrawide::{
    platform::{InMemoryDisplayProvider, InMemoryWindowSystem, SystemCall},
    services::{
        title_matches, AotToggleOutcome, ApplierConfig, EngineConfig, LayoutEngine,
        MonitorConfig,
    },
    ApplyOperation, ApplyOrder, ConfigEntry, Configuration, Point, Rect, Size, WindowHandle,
    WindowInfo,
};

fn window(handle: isize, title: &str) -> WindowInfo {
    WindowInfo::new(handle, title, 1000 + handle as u32, Rect::from_xywh(200, 200, 800, 600).unwrap())
}

fn engine_config() -> EngineConfig {
    EngineConfig {
        applier: ApplierConfig {
            settle_delay: Duration::ZERO,
            bring_to_front: true,
        },
        monitor: MonitorConfig {
            poll_interval: Duration::from_millis(25),
        },
        ..EngineConfig::default()
    }
}

fn setup(windows: Vec<WindowInfo>, config: EngineConfig) -> (Arc<InMemoryWindowSystem>, Arc<LayoutEngine>) {
    let system = Arc::new(InMemoryWindowSystem::new_with(windows));
    let displays = Arc::new(InMemoryDisplayProvider::new(
        Rect::from_xywh(0, 0, 5120, 1440).unwrap(),
    ));
    let engine = LayoutEngine::new(system.clone(), displays, config).unwrap();
    (system, engine)
}

fn opera_discord() -> Configuration {
    Configuration::new(
        "desk",
        vec![
            ConfigEntry::new("Opera", Point::new(-7, 0), Size::new(1720, 1401).unwrap())
                .with_apply_order("titlebar,pos,size,aot".parse().unwrap()),
            ConfigEntry::new("Discord", Point::new(4264, -1), Size::new(856, 1394).unwrap()),
        ],
    )
    .unwrap()
}

fn handles(raw: &[isize]) -> BTreeSet<WindowHandle> {
    raw.iter().copied().map(WindowHandle).collect()
}

#[test]
fn title_matching_is_case_folded_substring_search() {
    let titles = ["Opera Browser", "Discord - #general", "League of Legends (TM) Client", "", "ÄBC"];
    let patterns = ["opera", "OPERA BROWSER", "discord -", "legends (tm)", "", "äbc", "chrome", "browser opera"];

    for title in titles {
        for pattern in patterns {
            let expected = title.to_lowercase().contains(&pattern.to_lowercase());
            assert_eq!(
                title_matches(pattern, title),
                expected,
                "pattern {:?} against title {:?}",
                pattern,
                title
            );
        }
    }
}

#[tokio::test]
async fn opera_and_discord_are_placed_and_owned() {
    let (system, engine) = setup(
        vec![
            window(1, "Opera Browser"),
            window(2, "Discord - #general"),
            window(3, "Notepad"),
        ],
        engine_config(),
    );

    let report = engine.apply_configuration(opera_discord()).await.unwrap();
    assert!(report.report.unmatched.is_empty());

    let opera = system.window(WindowHandle(1)).unwrap();
    assert_eq!(opera.frame, Rect::from_xywh(-7, 0, 1720, 1401).unwrap());
    assert!(opera.has_titlebar);
    assert!(!opera.is_topmost);

    let discord = system.window(WindowHandle(2)).unwrap();
    assert_eq!(discord.frame, Rect::from_xywh(4264, -1, 856, 1394).unwrap());
    assert!(discord.has_titlebar);
    assert!(!discord.is_topmost);

    assert_eq!(engine.tracker().owned_windows().await, handles(&[1, 2]));
    assert!(system.calls_for(WindowHandle(3)).is_empty());
}

#[tokio::test]
async fn custom_apply_order_is_followed_per_window() {
    let order: ApplyOrder = "titlebar,size,pos,aot".parse().unwrap();
    let config = Configuration::new(
        "ordered",
        vec![
            ConfigEntry::new("Game", Point::new(0, 0), Size::new(3440, 1440).unwrap())
                .with_apply_order(order)
                .with_titlebar(false)
                .with_always_on_top(true),
            ConfigEntry::new("Chat", Point::new(3440, 0), Size::new(1680, 1392).unwrap()),
        ],
    )
    .unwrap();
    let (system, engine) = setup(vec![window(1, "Game"), window(2, "Chat")], engine_config());

    engine.apply_configuration(config).await.unwrap();

    let operations = |handle| -> Vec<ApplyOperation> {
        system
            .calls_for(WindowHandle(handle))
            .iter()
            .filter_map(SystemCall::operation)
            .collect()
    };
    assert_eq!(
        operations(1),
        vec![
            ApplyOperation::Titlebar,
            ApplyOperation::Size,
            ApplyOperation::Position,
            ApplyOperation::Aot
        ]
    );
    assert_eq!(operations(2), ApplyOrder::DEFAULT.to_vec());
}

#[tokio::test]
async fn only_fully_applied_windows_are_owned() {
    let (system, engine) = setup(
        vec![
            window(1, "Opera Browser"),
            window(2, "Opera Mail"),
            window(3, "Discord - #general"),
        ],
        engine_config(),
    );
    system.fail_operation(WindowHandle(2), ApplyOperation::Position);
    system.close_on(WindowHandle(3), ApplyOperation::Size);

    let report = engine.apply_configuration(opera_discord()).await.unwrap();

    assert_eq!(engine.tracker().owned_windows().await, handles(&[1]));
    assert_eq!(report.report.failed_windows(), 2);

    let opera_mail = report.report.results[0]
        .outcome_for(WindowHandle(2))
        .unwrap();
    assert_eq!(
        opera_mail.executed_order(),
        vec![
            ApplyOperation::Titlebar,
            ApplyOperation::Position,
            ApplyOperation::Size,
            ApplyOperation::Aot
        ]
    );
    assert!(!opera_mail.succeeded());
    assert_eq!(system.window(WindowHandle(2)).unwrap().frame.size, Size::new(800, 600).unwrap());
}

#[tokio::test]
async fn reset_makes_the_aot_toggle_a_no_op() {
    let (system, engine) = setup(
        vec![window(1, "Opera Browser"), window(2, "Discord - #general")],
        engine_config(),
    );
    engine.apply_configuration(opera_discord()).await.unwrap();

    match engine.toggle_aot().await.unwrap() {
        AotToggleOutcome::Toggled { changes, failures } => {
            assert_eq!(changes.len(), 2);
            assert!(failures.is_empty());
        }
        other => panic!("expected a toggle, got {:?}", other),
    }
    assert_eq!(engine.aot_status().await, "AOT: 2 windows");

    engine.reset().await.unwrap();
    assert!(engine.tracker().is_empty().await);
    assert!(engine.tracker().owned_windows().await.is_empty());

    system.clear_calls();
    assert_eq!(engine.toggle_aot().await.unwrap(), AotToggleOutcome::NothingApplied);
    assert!(system.calls().is_empty());
    assert_eq!(engine.aot_status().await, "AOT: None");
}

#[tokio::test]
async fn two_window_auto_align_fits_without_overlap() {
    let (_system, engine) = setup(Vec::new(), engine_config());
    let display = engine.primary_bounds().unwrap();
    let presets = engine.preset_count(2).unwrap();
    assert!(presets > 0);

    for preset in 0..presets {
        let rects = engine.auto_align(2, preset).unwrap().rects();
        assert_eq!(rects.len(), 2);
        assert!(!rects[0].intersects(&rects[1]), "preset {} overlaps", preset);
        for rect in &rects {
            assert!(display.contains(rect), "preset {} leaves the display", preset);
        }
    }
}

#[tokio::test]
async fn auto_reapply_moves_ownership_to_the_new_window() {
    let config = EngineConfig {
        auto_reapply: true,
        ..engine_config()
    };
    let (system, engine) = setup(vec![window(1, "League of Legends")], config);
    let league = Configuration::new(
        "league",
        vec![ConfigEntry::new("League of Legends", Point::new(840, 0), Size::new(3440, 1440).unwrap())],
    )
    .unwrap();

    let report = engine.apply_configuration(league).await.unwrap();
    assert!(report.auto_reapply);
    assert_eq!(engine.tracker().owned_by("League of Legends").await, handles(&[1]));

    system.close_window(WindowHandle(1));
    system.open_window(window(2, "League of Legends (TM) Client"));

    let moved = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if engine.tracker().owned_by("League of Legends").await == handles(&[2]) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(moved.is_ok(), "ownership never moved to the new window");

    assert_eq!(
        system.window(WindowHandle(2)).unwrap().frame,
        Rect::from_xywh(840, 0, 3440, 1440).unwrap()
    );
    engine.shutdown().await;
    assert!(!engine.is_auto_reapply_enabled().await);
}

#[tokio::test]
async fn stopped_monitor_does_not_reapply() {
    let (system, engine) = setup(vec![window(1, "Opera Browser")], engine_config());
    engine.apply_configuration(opera_discord()).await.unwrap();
    engine.enable_auto_reapply().await;
    engine.disable_auto_reapply().await;

    system.clear_calls();
    system.open_window(window(2, "Discord - #general"));
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(system.calls().is_empty());
    assert_eq!(engine.tracker().owned_windows().await, handles(&[1]));
    assert_eq!(engine.detect_changes().await.unwrap().len(), 1);
}
