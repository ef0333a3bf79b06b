use std::fs;
use std::path::Path;

use catlin_cli::{Cli, Commands};
use catlin_core::Cardinalities;
use catlin_data::{InstanceLog, ModelFiles};
use clap::Parser;

fn parse(args: &[&str]) -> Commands {
    let mut argv = vec!["catlin"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).expect("valid arguments").command
}

fn seed_model(dir: &Path) -> ModelFiles {
    let files = ModelFiles::new(dir, "odm0.");
    let mut log = InstanceLog::create(files.instance_log(), false).expect("log");
    for _ in 0..10 {
        log.append_line("1\t0\t1").expect("append");
        log.append_line("2\t1\t2").expect("append");
        log.append_line("3\t2\t0|3").expect("append");
    }
    log.close().expect("close");
    Cardinalities::new(vec![3, 4])
        .save(files.cardinalities())
        .expect("cardinalities");
    files
}

#[test]
fn train_then_predict() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = seed_model(dir.path());
    let dir_arg = dir.path().to_str().expect("utf-8 path");

    parse(&["train", "--dir", dir_arg, "--model", "odm0.", "--options", "-s 4 -c 1"])
        .run()
        .expect("train");
    assert!(files.model().exists());
    assert!(!files.instance_log().exists());

    let predict = match parse(&[
        "predict", "--dir", dir_arg, "--model", "odm0.", "--codes", "1,2", "--k", "2",
    ]) {
        Commands::Predict(cmd) => cmd,
        other => panic!("unexpected command {:?}", other),
    };
    let ranked = predict.run().expect("predict");
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked.best(), Some(2));

    let null_slot = match parse(&["predict", "-d", dir_arg, "-m", "odm0.", "--codes", "2,-"]) {
        Commands::Predict(cmd) => cmd,
        other => panic!("unexpected command {:?}", other),
    };
    assert_eq!(null_slot.run().expect("predict").best(), Some(3));
}

#[test]
fn keep_instances_retains_the_log() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = seed_model(dir.path());
    let dir_arg = dir.path().to_str().expect("utf-8 path");
    parse(&["train", "--dir", dir_arg, "--model", "odm0.", "--keep-instances"])
        .run()
        .expect("train");
    assert!(files.instance_log().exists());
}

#[test]
fn train_without_cardinalities_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = seed_model(dir.path());
    fs::remove_file(files.cardinalities()).expect("remove");
    let dir_arg = dir.path().to_str().expect("utf-8 path");
    let err = parse(&["train", "--dir", dir_arg, "--model", "odm0."])
        .run()
        .expect_err("missing cardinalities");
    assert!(err.to_string().contains("No cardinalities"));
    assert!(files.instance_log().exists());
}

#[test]
fn convert_count_and_cross_validate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = seed_model(dir.path());
    let dir_arg = dir.path().to_str().expect("utf-8 path");
    let output = dir.path().join("train.txt");

    parse(&[
        "convert",
        "--log",
        files.instance_log().to_str().expect("utf-8 path"),
        "--cardinalities",
        files.cardinalities().to_str().expect("utf-8 path"),
        "--output",
        output.to_str().expect("utf-8 path"),
    ])
    .run()
    .expect("convert");
    let text = fs::read_to_string(&output).expect("exchange");
    assert_eq!(text.lines().next(), Some("1 1:1 5:1"));
    assert_eq!(text.lines().nth(2), Some("3 3:1 4:1 7:1"));

    let counts = match parse(&[
        "count",
        "--log",
        files.instance_log().to_str().expect("utf-8 path"),
        "--columns",
        "1",
    ]) {
        Commands::Count(cmd) => cmd.run().expect("count"),
        other => panic!("unexpected command {:?}", other),
    };
    assert_eq!(counts.get(&0), Some(&10));
    assert_eq!(counts.get(&3), Some(&10));
    assert_eq!(counts.values().sum::<u64>(), 40);

    let accuracy = match parse(&["cross-validate", "-d", dir_arg, "-m", "odm0.", "--folds", "3"]) {
        Commands::CrossValidate(cmd) => cmd.run().expect("cross validation"),
        other => panic!("unexpected command {:?}", other),
    };
    assert_eq!(accuracy, 100.0);
    assert!(files.instance_log().exists());
}

#[test]
fn partition_writes_sub_logs_and_cardinalities() {
    let dir = tempfile::tempdir().expect("tempdir");
    let files = seed_model(dir.path());
    let dir_arg = dir.path().to_str().expect("utf-8 path");

    parse(&[
        "partition", "-d", dir_arg, "-m", "odm0.", "--feature-index", "0", "--values", "0,1",
    ])
    .run()
    .expect("partition");

    let zero = files.partition("0");
    assert_eq!(
        fs::read_to_string(zero.instance_log()).expect("sub-log"),
        "1\t1\n".repeat(10)
    );
    let other = files.partition("other");
    assert_eq!(
        fs::read_to_string(other.instance_log()).expect("sub-log"),
        "3\t0|3\n".repeat(10)
    );
    assert_eq!(
        Cardinalities::load(other.cardinalities()).expect("load"),
        Some(Cardinalities::new(vec![4]))
    );
    assert!(files.instance_log().exists());
}

#[test]
fn invalid_options_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_model(dir.path());
    let dir_arg = dir.path().to_str().expect("utf-8 path");
    let err = parse(&["train", "-d", dir_arg, "-m", "odm0.", "-o", "-s 12"])
        .run()
        .expect_err("bad solver");
    assert!(format!("{:#}", err).contains("-s 12"));
}
