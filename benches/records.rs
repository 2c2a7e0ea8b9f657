use criterion::{criterion_group, criterion_main, Criterion};

use wardbook::db::SharedDb;
use wardbook::records::RecordStore;

fn bench_insert_patient(c: &mut Criterion) {
    let store = RecordStore::new(SharedDb::open_in_memory().expect("db"));
    let mut i = 0u64;
    c.bench_function("insert_patient", |b| {
        b.iter(|| {
            i += 1;
            store
                .create_patient(&format!("patient-{}", i), (i % 90) as i64, "F", None)
                .expect("insert");
        })
    });
}

fn bench_joined_listing(c: &mut Criterion) {
    let store = RecordStore::new(SharedDb::open_in_memory().expect("db"));
    // 200 patients / 20 doctors / 1000 appointments
    let mut patients = Vec::new();
    for i in 0..200 {
        patients.push(store.create_patient(&format!("patient-{}", i), 30, "M", None).expect("patient"));
    }
    let mut doctors = Vec::new();
    for i in 0..20 {
        doctors.push(store.create_doctor(&format!("doctor-{}", i), "General", None).expect("doctor"));
    }
    for i in 0..1000usize {
        store
            .create_appointment(
                patients[i % patients.len()],
                doctors[i % doctors.len()],
                "2026-09-01",
                "scheduled",
                None,
            )
            .expect("appointment");
    }
    c.bench_function("list_appointments_joined_1k", |b| {
        b.iter(|| {
            let rows = store.list_appointments_joined().expect("joined");
            assert_eq!(rows.len(), 1000);
        })
    });
}

criterion_group!(benches, bench_insert_patient, bench_joined_listing);
criterion_main!(benches);
