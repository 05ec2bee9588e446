use linkgrad_graph::{
    config::{get_config, is_backprop_enabled, is_cosim_enabled, is_optimized_enabled},
    force_backprop_mode, no_backprop_mode, using_config, with_config, Config, Flag, GlobalConfig,
};

#[test]
fn nested_modes_restore_in_order() {
    assert!(is_backprop_enabled());
    {
        let _off = no_backprop_mode();
        assert!(!is_backprop_enabled());
        {
            let _on = force_backprop_mode();
            assert!(is_backprop_enabled());
        }
        assert!(!is_backprop_enabled());
    }
    assert!(is_backprop_enabled());
}

#[test]
fn restored_on_early_return() {
    fn inner() -> Result<(), ()> {
        let _off = no_backprop_mode();
        Err(())
    }

    assert!(inner().is_err());
    assert!(is_backprop_enabled());
}

#[test]
fn restored_on_unwind() {
    let result = std::panic::catch_unwind(|| {
        let _off = using_config(Flag::Cosim, !GlobalConfig::get().cosim);
        panic!("boom");
    });
    assert!(result.is_err());
    assert_eq!(is_cosim_enabled(), GlobalConfig::get().cosim);
}

#[test]
fn snapshot_reflects_overlays() {
    let before = Config::current();
    let inside = with_config(Flag::UseOptimized, false, || {
        with_config(Flag::Debug, true, Config::current)
    });
    assert!(!inside.use_optimized);
    assert!(inside.debug);
    assert_eq!(Config::current(), before);
    assert_eq!(is_optimized_enabled(), GlobalConfig::get().use_optimized);
}

#[test]
fn overlays_are_per_thread() {
    let _off = no_backprop_mode();
    let other = std::thread::spawn(|| get_config(Flag::EnableBackprop))
        .join()
        .unwrap_or(false);
    assert!(other);
    assert!(!is_backprop_enabled());
}

#[test]
fn every_flag_has_a_default() {
    let global = GlobalConfig::get();
    for flag in Flag::ALL {
        assert_eq!(get_config(flag), global.value(flag), "{}", flag.as_str());
    }
    assert!(global.enable_backprop);
}
