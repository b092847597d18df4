//! End-to-end loading over synthetic multi-shard snapshots.

use nbsnap_core::{ArrayData, Dtype, Family, FamilySlice, SnapshotError};
use nbsnap_snapshot::{FormatConfig, ShapePolicy, Snapshot, SnapshotOptions};
use nbsnap_store::{MemDataset, MemFile};
use nbsnap_test_utils::{init_test_logging, Fixture, SnapshotBuilder};
use smallvec::smallvec;

fn gas() -> Family {
    Family::from("gas")
}

fn dm() -> Family {
    Family::from("dm")
}

fn two_shard_fixture() -> Fixture {
    SnapshotBuilder::new("snap_010", 2)
        .particles("PartType0", &[100, 100])
        .particles("PartType1", &[50, 50])
        .field("PartType0", "Density", 1)
        .build()
}

#[test]
fn family_slices_follow_table_order() {
    let fx = two_shard_fixture();
    let snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    assert_eq!(snap.shards().len(), 2);
    assert_eq!(snap.family_slice(&gas()), Some(FamilySlice::new(0, 200)));
    assert_eq!(snap.family_slice(&dm()), Some(FamilySlice::new(200, 300)));
    assert_eq!(snap.num_particles(), 300);
    let fams: Vec<&str> = snap.families().map(Family::name).collect();
    assert_eq!(fams, ["gas", "dm"]);
    assert_eq!(snap.family_len(&Family::from("star")), 0);
}

#[test]
fn density_fills_in_shard_order() {
    init_test_logging();
    let fx = two_shard_fixture();
    let mut snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    let rho = snap.load("rho", Some(&gas())).unwrap();
    assert_eq!(rho.rows(), 200);
    assert_eq!(rho.dims(), 1);
    assert_eq!(rho.dtype(), Dtype::F32);
    assert_eq!(rho.data().to_f64_vec(), fx.expected(&["PartType0"], "Density"));
}

#[test]
fn unscoped_load_matches_scoped_loads() {
    let fx = two_shard_fixture();
    let mut snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    let all = snap.load("pos", None).unwrap().clone();
    assert_eq!((all.rows(), all.dims()), (300, 3));
    let gas_pos = snap.load("pos", Some(&gas())).unwrap().clone();
    let dm_pos = snap.load("pos", Some(&dm())).unwrap().clone();
    assert_eq!(all.rows_slice(0..200).unwrap(), gas_pos);
    assert_eq!(all.rows_slice(200..300).unwrap(), dm_pos);
    assert_eq!(
        all.data().to_f64_vec(),
        fx.expected(&["PartType0", "PartType1"], "Coordinates")
    );
}

#[test]
fn particle_ids_are_contiguous_over_families() {
    let fx = two_shard_fixture();
    let mut snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    let iord = snap.load("iord", None).unwrap();
    assert_eq!(iord.dtype(), Dtype::U64);
    let ids: Vec<f64> = iord.data().to_f64_vec();
    assert_eq!(ids, (0..300).map(f64::from).collect::<Vec<_>>());
}

#[test]
fn unavailable_name_is_not_found_and_not_cached() {
    let fx = two_shard_fixture();
    let mut snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();

    // Density exists for gas only, so it is listed but not loadable for all.
    assert!(snap.loadable_keys().iter().any(|k| k == "rho"));
    assert!(snap.is_loadable("rho", Some(&gas())));
    assert!(!snap.is_loadable("rho", None));

    let err = snap.load("rho", None).unwrap_err();
    assert_eq!(
        err,
        SnapshotError::NotFound {
            name: "rho".into(),
            family: None
        }
    );
    assert!(!snap.is_loaded("rho", None));
    assert!(snap.get("rho", None).is_none());

    assert!(matches!(
        snap.load("temp", Some(&dm())),
        Err(SnapshotError::NotFound { .. })
    ));
}

#[test]
fn unknown_family_is_rejected() {
    let fx = two_shard_fixture();
    let mut snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    assert!(matches!(
        snap.load("pos", Some(&Family::from("star"))),
        Err(SnapshotError::UnknownFamily { .. })
    ));
}

#[test]
fn table_mass_synthesises_constant_array() {
    let fx = SnapshotBuilder::new("snap", 2)
        .particles("PartType0", &[10, 5])
        .particles("PartType1", &[7, 8])
        .table_mass("PartType1", 0.25)
        .build();
    let mut snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();

    let dm_mass = snap.load("mass", Some(&dm())).unwrap();
    assert_eq!(dm_mass.rows(), 15);
    assert!(dm_mass.data().to_f64_vec().iter().all(|&m| m == 0.25));

    // Mixed: gas reads its dataset, dm is synthesised, output keeps gas's dtype.
    let all = snap.load("mass", None).unwrap();
    assert_eq!(all.dtype(), Dtype::F32);
    let values = all.data().to_f64_vec();
    assert_eq!(&values[..15], fx.expected(&["PartType0"], "Mass").as_slice());
    assert!(values[15..].iter().all(|&m| m == 0.25));
}

#[test]
fn cache_returns_same_buffer_and_keeps_edits() {
    let fx = two_shard_fixture();
    let mut snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    snap.load("rho", Some(&gas())).unwrap();
    assert!(snap.is_loaded("rho", Some(&gas())));

    snap.get_mut("rho", Some(&gas()))
        .unwrap()
        .data_mut()
        .as_f32_mut()
        .unwrap()[0] = -1.0;
    let again = snap.load("rho", Some(&gas())).unwrap();
    assert_eq!(again.data().get_f64(0), Some(-1.0));

    let evicted = snap.evict("rho", Some(&gas())).unwrap();
    assert_eq!(evicted.rows(), 200);
    let reread = snap.load("rho", Some(&gas())).unwrap();
    assert_ne!(reread.data().get_f64(0), Some(-1.0));
}

#[test]
fn flattened_dataset_is_reshaped_with_warning() {
    let fx = SnapshotBuilder::new("snap", 2)
        .particles("PartType0", &[4, 6])
        .flattened_field("PartType0", "Acceleration", 3)
        .build();
    let mut snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    let acc = snap.load("Acceleration", None).unwrap();
    assert_eq!((acc.rows(), acc.dims()), (10, 3));
    assert_eq!(
        acc.data().to_f64_vec(),
        fx.expected(&["PartType0"], "Acceleration")
    );
    let warnings = snap.shape_warnings();
    assert_eq!(warnings.len(), 2);
    assert_eq!(warnings[0].rows, 12);
    assert_eq!(warnings[0].declared, 4);
    assert_eq!(warnings[0].inferred_dims, 3);
}

#[test]
fn strict_policy_rejects_mismatched_shape() {
    let fx = SnapshotBuilder::new("snap", 1)
        .particles("PartType0", &[4])
        .flattened_field("PartType0", "Acceleration", 3)
        .build();
    let options = SnapshotOptions::default().with_shape_policy(ShapePolicy::Strict);
    let mut snap =
        Snapshot::open(fx.store(), fx.base(), &FormatConfig::gadget_hdf(), options).unwrap();
    assert!(matches!(
        snap.load("Acceleration", None),
        Err(SnapshotError::Format { .. })
    ));
    assert!(!snap.is_loaded("Acceleration", None));
    assert!(snap.shape_warnings().is_empty());
}

#[test]
fn non_integral_width_is_format_error() {
    // Five flat elements for two particles cannot be reshaped.
    let mut fx = SnapshotBuilder::new("snap", 1)
        .particles("PartType0", &[2])
        .build();
    let mut file = MemFile::new();
    file.set_attr("Header", "NumFilesPerSnapshot", 1i64)
        .insert_dataset(
            "PartType0/Coordinates",
            MemDataset::rows(ArrayData::F32(vec![0.0; 6]), 3).unwrap(),
        )
        .insert_dataset("PartType0/Odd", MemDataset::flat(ArrayData::F32(vec![0.0; 5])));
    fx.store_mut().insert("snap.0.hdf5", file);
    let mut snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    assert!(matches!(
        snap.load("Odd", None),
        Err(SnapshotError::Format { .. })
    ));
}

/// Single shard of four gas particles plus one extra `PartType0` dataset.
fn gas_shard_with(name: &str, dataset: MemDataset) -> Fixture {
    let mut fx = SnapshotBuilder::new("snap", 1)
        .particles("PartType0", &[4])
        .build();
    let mut file = MemFile::new();
    file.set_attr("Header", "NumFilesPerSnapshot", 1i64)
        .insert_dataset(
            "PartType0/Coordinates",
            MemDataset::rows(ArrayData::F32(vec![0.0; 12]), 3).unwrap(),
        )
        .insert_dataset(&format!("PartType0/{name}"), dataset);
    fx.store_mut().insert("snap.0.hdf5", file);
    fx
}

#[test]
fn empty_dataset_for_declared_particles_is_format_error() {
    let fx = gas_shard_with("Empty", MemDataset::flat(ArrayData::F32(Vec::new())));
    let mut snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    assert_eq!(snap.family_len(&gas()), 4);
    for scope in [Some(gas()), None] {
        assert!(matches!(
            snap.load("Empty", scope.as_ref()),
            Err(SnapshotError::Format { .. })
        ));
        assert!(!snap.is_loaded("Empty", scope.as_ref()));
    }
    assert!(snap.shape_warnings().is_empty());
}

#[test]
fn zero_width_dataset_is_format_error() {
    let empty_rows = MemDataset::new(ArrayData::F64(Vec::new()), smallvec![4, 0]).unwrap();
    let fx = gas_shard_with("Hollow", empty_rows);
    let mut snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    assert!(matches!(
        snap.load("Hollow", Some(&gas())),
        Err(SnapshotError::Format { .. })
    ));
    assert!(!snap.is_loaded("Hollow", Some(&gas())));
    // The rest of the shard still loads.
    assert_eq!(snap.load("pos", Some(&gas())).unwrap().rows(), 4);
}

#[test]
fn star_family_concatenates_types_in_table_order() {
    let fx = SnapshotBuilder::new("snap", 2)
        .particles("PartType0", &[3, 3])
        .particles("PartType2", &[2, 1])
        .particles("PartType4", &[5, 4])
        .build();
    let mut snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    let star = Family::from("star");
    assert_eq!(snap.family_slice(&star), Some(FamilySlice::new(6, 18)));
    let vel = snap.load("vel", Some(&star)).unwrap();
    assert_eq!(
        vel.data().to_f64_vec(),
        fx.expected(&["PartType2", "PartType4"], "Velocities")
    );
}

#[test]
fn nested_dataset_paths_resolve() {
    let fx = SnapshotBuilder::new("snap", 2)
        .particles("PartType0", &[3, 2])
        .field("PartType0", "ElementAbundance/Iron", 1)
        .build();
    let mut snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    assert!(snap
        .loadable_keys()
        .iter()
        .any(|k| k == "ElementAbundance/Iron"));
    let iron = snap.load("ElementAbundance/Iron", None).unwrap();
    assert_eq!(
        iron.data().to_f64_vec(),
        fx.expected(&["PartType0"], "ElementAbundance/Iron")
    );
}

#[test]
fn empty_shard_contributes_nothing() {
    let fx = SnapshotBuilder::new("snap", 3)
        .particles("PartType0", &[4, 0, 2])
        .build();
    let mut snap = Snapshot::open_gadget(fx.store(), fx.base()).unwrap();
    let pos = snap.load("pos", None).unwrap();
    assert_eq!(pos.rows(), 6);
    assert_eq!(pos.data().to_f64_vec(), fx.expected(&["PartType0"], "Coordinates"));
}
