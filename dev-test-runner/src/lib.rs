//! Accessors generated by the build script from `schemas/`, compiled and
//! exercised against in-memory and NDJSON rows.

pub mod babies {
    include!(concat!(env!("OUT_DIR"), "/babies.rs"));
}

/// Same schemas, with variables common to every format implemented in the base.
pub mod common_babies {
    include!(concat!(env!("OUT_DIR"), "/common/babies.rs"));
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use babygen::runtime::{Activator, Datum, MemoryStore, Ntuple, NumericValue, ReaderState};

    use crate::babies::{self, Baby, BabyFormat, BabyFull, BabySkim};

    fn full_row(event: i64, pt: f32, x: i32, jets: Vec<f32>) -> Vec<(&'static str, Datum)> {
        vec![
            ("run", Datum::from(1u64)),
            ("event", Datum::from(event)),
            ("sample", Datum::from("ttbar")),
            ("pt", Datum::from(pt)),
            ("eta", Datum::from(-0.5f32)),
            ("id", Datum::from(13)),
            ("type", Datum::from(2)),
            ("x", Datum::from(x)),
            ("jets_pt", Datum::from(jets)),
        ]
    }

    fn full() -> BabyFull {
        let store = MemoryStore::with_rows(
            BabyFull::TREE,
            [full_row(100, 25.0, 7, vec![40.0, 30.5]), full_row(101, 31.5, -3, Vec::new())],
        );
        BabyFull::new(Box::new(store))
    }

    fn skim() -> BabySkim {
        let store = MemoryStore::with_rows(
            BabySkim::TREE,
            [[
                ("run", Datum::from(1u64)),
                ("event", Datum::from(200i64)),
                ("pt", Datum::from(12.0f32)),
                ("iso", Datum::from(0.25f32)),
                ("x", Datum::from(1.5f32)),
            ]],
        );
        BabySkim::new(Box::new(store))
    }

    #[test]
    fn accessors_follow_the_loaded_row() {
        let mut baby = full();
        {
            let mut active = baby.activate().unwrap();
            assert_eq!(active.get_entries().unwrap(), 2);
            active.get_entry(0).unwrap();
            assert_eq!(active.run(), 1);
            assert_eq!(active.event(), 100);
            assert_eq!(active.pt(), 25.0);
            assert_eq!(active.sample(), "ttbar");
            assert_eq!(active.r#type(), 2);
            assert_eq!(active.jets_pt(), [40.0, 30.5]);

            active.get_entry(1).unwrap();
            assert_eq!(active.event(), 101);
            assert_eq!(active.pt(), 31.5);
            assert!(active.jets_pt().is_empty());
        }
        assert_eq!(baby.entry().state(), ReaderState::Deactivated);
    }

    #[test]
    fn multiple_types_get_one_accessor_per_type() {
        let mut full = full();
        let mut active = full.activate().unwrap();
        active.get_entry(1).unwrap();
        assert_eq!(active.x(), -3);

        let mut skim = skim();
        let mut active = skim.activate().unwrap();
        active.get_entry(0).unwrap();
        assert_eq!(active.x_1(), 1.5);
    }

    #[test]
    #[should_panic(expected = "variable `iso` is not available in format `full`")]
    fn missing_variable_is_fatal() {
        let mut baby = full();
        let mut active = baby.activate().unwrap();
        active.get_entry(0).unwrap();
        let _ = active.iso();
    }

    #[test]
    #[should_panic(expected = "variable `x` is not available in format `skim`")]
    fn other_type_accessor_is_fatal() {
        let mut baby = skim();
        let mut active = baby.activate().unwrap();
        active.get_entry(0).unwrap();
        let _ = active.x();
    }

    #[test]
    fn registry_names_every_format() {
        assert_eq!(BabyFormat::ALL, [BabyFormat::Full, BabyFormat::Skim]);
        assert_eq!(BabyFormat::from_name("skim"), Some(BabyFormat::Skim));
        assert_eq!(BabyFormat::from_name("nano"), None);
        assert_eq!(BabyFormat::Full.name(), "full");
        assert_eq!(BabyFormat::Skim.tree(), "Events");
    }

    #[test]
    fn trait_objects_read_ndjson_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"run": 3, "event": 7, "pt": 18.5, "iso": 0.1, "x": 2.5}}"#).unwrap();
        writeln!(file, r#"{{"run": 3, "event": 8, "pt": 19.5, "iso": 0.2, "x": 3.5}}"#).unwrap();

        let mut baby = babies::open(BabyFormat::Skim, [file.path()]).unwrap();
        assert_eq!(baby.format(), "skim");
        assert_eq!(baby.get_entries().unwrap(), 2);

        let mut active = Activator::new(&mut *baby).unwrap();
        active.get_entry(1).unwrap();
        assert_eq!(active.event(), 8);
        assert_eq!(active.iso(), 0.2);
    }

    #[test]
    fn functions_dispatch_on_format() {
        let x = babies::get_function("x");
        assert!(x.is_resolved());

        let mut full = full();
        let mut active = full.activate().unwrap();
        active.get_entry(0).unwrap();
        let as_dyn: &dyn Baby = &*active;
        assert_eq!(x.eval(as_dyn), NumericValue::Scalar(7.0));
        let jets = babies::get_function("jets_pt").eval(as_dyn);
        assert_eq!(jets.as_vector(), Some(&[40.0, 30.5][..]));
        drop(active);

        let mut skim = skim();
        let mut active = skim.activate().unwrap();
        active.get_entry(0).unwrap();
        assert_eq!(x.eval(&*active as &dyn Baby), NumericValue::Scalar(1.5));
    }

    #[test]
    fn unknown_and_text_variables_evaluate_to_zero() {
        let table = babies::function_table();
        assert!(!table.contains("sample"));
        let met = babies::get_function("met");
        assert!(!met.is_resolved());

        let mut baby = full();
        let mut active = baby.activate().unwrap();
        active.get_entry(0).unwrap();
        assert_eq!(met.eval(&*active as &dyn Baby), NumericValue::Scalar(0.0));
    }

    #[test]
    fn text_typed_format_evaluates_to_zero() {
        let label = babies::get_function("label");
        assert!(label.is_resolved());

        let mut skim = skim();
        let mut active = skim.activate().unwrap();
        active.get_entry(0).unwrap();
        assert_eq!(label.eval(&*active as &dyn Baby), NumericValue::Scalar(0.0));
    }

    #[test]
    fn common_variables_live_in_the_base() {
        use crate::common_babies;

        let store = MemoryStore::with_rows(
            "Events",
            [[
                ("run", Datum::from(9u64)),
                ("event", Datum::from(1i64)),
                ("pt", Datum::from(5.0f32)),
                ("iso", Datum::from(0.5f32)),
                ("x", Datum::from(0.5f32)),
            ]],
        );
        let mut baby = common_babies::BabyFormat::Skim.new_baby(Box::new(store));
        let mut active = Activator::new(&mut *baby).unwrap();
        active.get_entry(0).unwrap();
        assert_eq!(active.run(), 9);
        assert_eq!(active.pt(), 5.0);
        assert_eq!(active.iso(), 0.5);
    }
}
