use std::fs;

use assert_cmd::Command;
use pretty_assertions::assert_eq;
use rstest::rstest;
use streamreduce::schema::CADENCE;
use streamreduce::wire::{Formatter, Reader};
use streamreduce_test_support::{id, replay, stream, time_series, Collector, Event, SECOND, START_2014};
use temp_dir::TempDir;

fn input_stream() -> Vec<u8> {
    let schema = time_series(id(1), &["a"]);
    let mut body = vec![Event::schema(&schema)];
    for i in 0..120 {
        let tag = START_2014 + f64::from(i) * SECOND;
        body.push(Event::packet(&schema, vec![vec![tag], vec![f64::from(i)]]));
    }
    let mut formatter = Formatter::new(Vec::new());
    replay(&stream(body), &mut formatter).unwrap();
    formatter.into_inner()
}

fn parse(bytes: &[u8]) -> Collector {
    let mut collector = Collector::default();
    Reader::new(bytes).drive(&mut collector).unwrap();
    collector
}

#[rstest]
#[case::missing(&[])]
#[case::empty(&[""])]
#[case::zero(&["0"])]
#[case::negative(&["-10"])]
#[case::not_a_number(&["often"])]
fn bad_window_is_a_usage_error(#[case] args: &[&str]) {
    Command::cargo_bin("reduce")
        .unwrap()
        .args(args)
        .assert()
        .failure();
}

#[test]
fn reduces_files() {
    let dir = TempDir::new().unwrap();
    let input = dir.child("input.d2s");
    let output = dir.child("output.d2s");
    fs::write(&input, input_stream()).unwrap();

    Command::cargo_bin("reduce")
        .unwrap()
        .arg("60")
        .arg(&input)
        .arg(&output)
        .assert()
        .success();

    let collector = parse(&fs::read(&output).unwrap());
    assert_eq!(collector.schemas()[0].property(CADENCE), Some("60 s"));
    let means: Vec<_> = collector
        .records(id(1))
        .iter()
        .map(|r| r.field(1)[0])
        .collect();
    assert_eq!(means, vec![29.5, 89.5]);
}

#[test]
fn reduces_stdin_to_stdout() {
    let assert = Command::cargo_bin("reduce")
        .unwrap()
        .args(["1 min", "-", "-"])
        .write_stdin(input_stream())
        .assert()
        .success();
    let collector = parse(&assert.get_output().stdout);
    assert_eq!(collector.records(id(1)).len(), 2);
}

#[test]
fn corrupt_input_fails() {
    Command::cargo_bin("reduce")
        .unwrap()
        .arg("60")
        .write_stdin(b"not a stream".as_slice())
        .assert()
        .failure();
}

#[test]
fn streamfilter_strips_properties() {
    let assert = Command::cargo_bin("streamfilter")
        .unwrap()
        .arg("strip")
        .write_stdin(input_stream())
        .assert()
        .success();
    let collector = parse(&assert.get_output().stdout);
    assert_eq!(collector.records(id(1)).len(), 120);
    assert_eq!(collector.comments()[0].value, "120");
}
