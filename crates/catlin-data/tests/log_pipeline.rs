use std::collections::BTreeSet;
use std::fs;

use catlin_core::{Cardinalities, FeatureCode, FeatureVector, SparseEncoder};
use catlin_data::{
    convert_log_file, convert_log_line, exchange_line, partition_by_feature, InstanceLog,
    ModelFiles, ProblemBuilder,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::tempdir;

fn random_vector(rng: &mut StdRng, cards: &[u32]) -> FeatureVector {
    let mut fv = FeatureVector::new();
    for (i, &card) in cards.iter().enumerate() {
        let code = match rng.gen_range(0..4) {
            0 => FeatureCode::Null(0),
            1 => FeatureCode::multiple((0..rng.gen_range(0..3)).map(|_| rng.gen_range(0..card))),
            _ => FeatureCode::Single(rng.gen_range(0..card)),
        };
        fv = fv.with_slot(format!("f{i}"), code, card);
    }
    fv
}

#[test]
fn appended_records_convert_to_the_prediction_encoding() {
    let dir = tempdir().expect("tempdir");
    let cards = vec![3u32, 2, 5, 1, 4];
    let mut rng = StdRng::seed_from_u64(7);

    for exclude_nulls in [false, true] {
        let path = dir.path().join(format!("agree_{exclude_nulls}.ins"));
        let mut log = InstanceLog::create(&path, exclude_nulls).expect("create log");
        let encoder = SparseEncoder::new(Cardinalities::new(cards.clone()))
            .expect("encoder")
            .with_exclude_nulls(exclude_nulls);

        let mut expected = Vec::new();
        for _ in 0..100 {
            let fv = random_vector(&mut rng, &cards);
            let label = rng.gen_range(-3..4);
            log.append(label, &fv).expect("append");
            expected.push(exchange_line(label, &encoder.encode(&fv)));
        }
        log.close().expect("close");

        let converted: Vec<String> = fs::read_to_string(&path)
            .expect("read log")
            .lines()
            .map(|line| convert_log_line(line, encoder.cardinalities()).expect("convert"))
            .collect();
        assert_eq!(converted, expected);
    }
}

#[test]
fn exchange_file_and_problem_agree() {
    let dir = tempdir().expect("tempdir");
    let files = ModelFiles::new(dir.path(), "odm0.");
    let cards = Cardinalities::new(vec![3, 2]);

    let mut log = InstanceLog::create(files.instance_log(), false).expect("create log");
    log.append_line("1\t0\t1").expect("append");
    log.append_line("-1\t2|0\t-1").expect("append");
    log.close().expect("close");

    let n = convert_log_file(files.instance_log(), files.exchange(), &cards).expect("convert");
    assert_eq!(n, 2);
    assert_eq!(
        fs::read_to_string(files.exchange()).expect("read exchange"),
        "1 1:1 4:1\n-1 3:1 1:1\n"
    );

    let problem = ProblemBuilder::new(&cards, -1.0)
        .expect("builder")
        .build(&mut log)
        .expect("build");
    assert_eq!(problem.labels(), &[1, -1]);
    assert_eq!(problem.row(0).indices(), vec![1, 4]);
    assert_eq!(problem.row(1).indices(), vec![1, 3]);
}

#[test]
fn counter_survives_restart_through_recount() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("m.ins");
    let fv = FeatureVector::new().with_slot("a", FeatureCode::Single(1), 2);

    let mut log = InstanceLog::create(&path, false).expect("create log");
    for _ in 0..12 {
        log.append(1, &fv).expect("append");
    }
    assert_eq!(log.count().expect("count"), 12);
    drop(log);

    let mut restarted = InstanceLog::open_read(&path);
    assert_eq!(restarted.count().expect("recount"), 12);
}

#[test]
fn partitioned_sub_logs_train_with_the_reduced_cardinalities() {
    let dir = tempdir().expect("tempdir");
    let files = ModelFiles::new(dir.path(), "odm0.");
    let cards = Cardinalities::new(vec![3, 4, 2]);

    let mut log = InstanceLog::create(files.instance_log(), false).expect("create log");
    for (label, pos, rest) in [(1, 0, 1), (2, 3, 0), (1, 3, 1), (4, 2, 0)] {
        log.append_line(&format!("{label}\t{rest}\t{pos}\t{rest}"))
            .expect("append");
    }
    log.close().expect("close");

    let known: BTreeSet<i64> = [3].into_iter().collect();
    let mut parts =
        partition_by_feature(&log, 1, &known, "other", &files).expect("partition");
    let sub_cards = cards.without_slot(1);

    let mut total = 0;
    for sub in parts.values_mut() {
        let problem = ProblemBuilder::new(&sub_cards, 1.0)
            .expect("builder")
            .build(sub)
            .expect("build sub-problem");
        assert!(problem.rows().iter().all(|row| row.max_index() <= 6));
        total += problem.len();
    }
    assert_eq!(total, 4);
}
