//! Shard resolution, release, properties and units.

use std::path::Path;

use nbsnap_core::{MetaValue, SnapshotError};
use nbsnap_snapshot::properties::{FileUnits, KPC_CM};
use nbsnap_snapshot::{FormatConfig, Snapshot, SnapshotOptions};
use nbsnap_store::MemStore;
use nbsnap_test_utils::{CatalogueBuilder, SnapshotBuilder};

#[test]
fn single_container_path_opens_directly() {
    let fx = SnapshotBuilder::new("snap_single.hdf5", 1)
        .particles("PartType1", &[12])
        .single_file()
        .build();
    let snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    assert_eq!(snap.shards().len(), 1);
    assert_eq!(snap.num_particles(), 12);
}

#[test]
fn missing_path_is_no_container() {
    let store = MemStore::new();
    let err = Snapshot::open_gadget(&store, "nowhere").unwrap_err();
    assert_eq!(
        err,
        SnapshotError::NoContainer {
            path: Path::new("nowhere").to_path_buf()
        }
    );
}

#[test]
fn release_closes_every_shard_and_invalidates_handles() {
    let fx = SnapshotBuilder::new("snap", 3)
        .particles("PartType0", &[2, 2, 2])
        .build();
    let snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    assert_eq!(fx.store().total_open_handles(), 3);

    let handle = snap.handle();
    assert!(handle.is_alive());
    assert_eq!(handle.upgrade().map(|l| l.index().total()), Some(6));

    snap.release();
    assert_eq!(fx.store().total_open_handles(), 0);
    assert!(!handle.is_alive());
    assert!(handle.upgrade().is_none());
}

#[test]
fn held_layout_does_not_keep_handle_alive() {
    let fx = SnapshotBuilder::new("snap", 2)
        .particles("PartType0", &[3, 3])
        .build();
    let snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    let handle = snap.handle();
    let held = handle.upgrade().unwrap();

    snap.release();
    assert_eq!(fx.store().total_open_handles(), 0);
    assert!(!handle.is_alive());
    assert!(handle.upgrade().is_none());
    assert!(!handle.clone().is_alive());
    // The layout itself stays readable for whoever holds it.
    assert_eq!(held.index().total(), 6);
}

#[test]
fn snapshot_ids_are_unique() {
    let fx = SnapshotBuilder::new("snap", 1)
        .particles("PartType0", &[1])
        .build();
    let a = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    let b = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    assert_ne!(a.id(), b.id());
    assert_eq!(fx.store().total_open_handles(), 2);
}

#[test]
fn header_properties_are_populated() {
    let fx = SnapshotBuilder::new("snap", 2)
        .particles("PartType0", &[1, 1])
        .header_attr("Time_GYR", 6.5)
        .build();
    let snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    let props = snap.properties();
    assert_eq!(props.get_f64("a"), Some(0.5));
    assert_eq!(props.get_f64("z"), Some(1.0));
    assert_eq!(props.get_f64("h"), Some(0.7));
    assert_eq!(props.get_f64("omegaM0"), Some(0.3));
    assert_eq!(props.get_f64("omegaL0"), Some(0.7));
    assert_eq!(props.get_f64("boxsize"), Some(100.0));
    assert_eq!(props.get_f64("time"), Some(6.5));
    assert_eq!(props.get("NumFilesPerSnapshot"), Some(&MetaValue::Int(2)));
    assert!(!props.contains("omegaB0"));
    assert!(!props.contains("ExpansionFactor"));
}

#[test]
fn expansion_factor_falls_back_to_redshift() {
    let fx = SnapshotBuilder::new("snap", 1)
        .particles("PartType0", &[1])
        .without_header_attr("ExpansionFactor")
        .header_attr("Redshift", 3.0)
        .build();
    let snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    assert_eq!(snap.properties().get_f64("a"), Some(0.25));
    assert_eq!(snap.properties().get_f64("z"), Some(3.0));
    assert_eq!(snap.properties().get_f64("Redshift"), Some(3.0));
}

#[test]
fn units_are_per_h_when_cosmological() {
    let fx = SnapshotBuilder::new("snap", 1)
        .particles("PartType0", &[1])
        .comoving(true)
        .build();
    let snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    let units = snap.units().unwrap();
    assert!(units.cosmological && units.per_h && !units.defaulted);
    assert_eq!(units.velocity_cm_per_s, 1e5);

    let fx = SnapshotBuilder::new("snap", 1)
        .particles("PartType0", &[1])
        .comoving(false)
        .build();
    let snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    assert!(!snap.units().unwrap().per_h);
}

#[test]
fn hubble_param_implies_cosmological() {
    let fx = SnapshotBuilder::new("snap", 1)
        .particles("PartType0", &[1])
        .build();
    let snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    assert!(snap.units().unwrap().cosmological);

    let fx = SnapshotBuilder::new("snap", 1)
        .particles("PartType0", &[1])
        .without_header_attr("HubbleParam")
        .build();
    let snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    assert!(!snap.units().unwrap().cosmological);
}

#[test]
fn missing_units_fall_back_to_defaults() {
    let fx = SnapshotBuilder::new("snap", 1)
        .particles("PartType0", &[1])
        .units(false)
        .build();
    let snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    let units = snap.units().unwrap();
    assert!(units.defaulted);
    assert_eq!(units.length_cm, KPC_CM);
    assert_eq!(units.velocity_cm_per_s, FileUnits::default().velocity_cm_per_s);
}

#[test]
fn initializers_can_be_replaced() {
    let fx = SnapshotBuilder::new("snap", 1)
        .particles("PartType0", &[1])
        .build();
    let options = SnapshotOptions::default().with_initializers(Vec::new());
    let snap = Snapshot::open(fx.store(), fx.base(), &FormatConfig::gadget_hdf(), options).unwrap();
    assert!(snap.properties().is_empty());
    assert!(snap.units().is_none());
}

#[test]
fn group_catalogue_layout_and_properties() {
    let fx = CatalogueBuilder::new("fof_subhalo_tab", &[2, 3]).build();
    let snap = Snapshot::open_subfind(fx.store(), fx.base()).unwrap();
    assert_eq!(snap.shards().len(), 2);
    let expected: i64 = fx.lengths("PartType0").iter().sum::<i64>()
        + fx.lengths("PartType1").iter().sum::<i64>();
    assert_eq!(snap.num_particles() as i64, expected);
    assert_eq!(
        snap.properties().get("Total_Number_of_groups"),
        Some(&MetaValue::Int(5))
    );
    assert_eq!(snap.properties().get("NTask"), Some(&MetaValue::Int(2)));
}

#[test]
fn group_catalogue_falls_back_to_header_shard_count() {
    let fx = CatalogueBuilder::new("fof", &[1, 1, 1]).without_ntask().build();
    let mut snap = Snapshot::open_subfind(fx.store(), fx.base()).unwrap();
    assert_eq!(snap.shards().len(), 3);
    let pos = snap.load("pos", None).unwrap();
    assert_eq!(
        pos.data().to_f64_vec(),
        fx.expected(&["PartType0", "PartType1"], "Coordinates")
    );
}
