//! Benchmarks for the S-expression codec and request framing

use bytes::BytesMut;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rqap::protocol::{decode_sexp, encode_request, encode_sexp, encoded_len, Arg, CommandId};
use rqap::{Logical, Sexp};

/// A data-frame-shaped value: named columns plus the usual attributes.
fn sample_frame(rows: usize) -> Sexp {
    Sexp::tagged_list(vec![
        (
            "id".to_string(),
            Sexp::integers((0..rows as i32).collect::<Vec<_>>()),
        ),
        (
            "value".to_string(),
            Sexp::doubles((0..rows).map(|i| i as f64 * 0.25).collect::<Vec<_>>()),
        ),
        (
            "label".to_string(),
            Sexp::strings(
                (0..rows)
                    .map(|i| {
                        if i % 7 == 0 {
                            None
                        } else {
                            Some(format!("observation-{}", i))
                        }
                    })
                    .collect(),
            ),
        ),
        (
            "flag".to_string(),
            Sexp::logicals(
                (0..rows)
                    .map(|i| if i % 2 == 0 { Logical::True } else { Logical::False })
                    .collect::<Vec<_>>(),
            ),
        ),
    ])
    .with_attribute(
        "names",
        Sexp::strings(vec![
            Some("id".into()),
            Some("value".into()),
            Some("label".into()),
            Some("flag".into()),
        ]),
    )
    .with_attribute("class", Sexp::string("data.frame"))
}

fn encode_to_vec(value: &Sexp) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(encoded_len(value));
    encode_sexp(value, &mut buf);
    buf.to_vec()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    group.bench_function("small_int_vector", |b| {
        let value = Sexp::integers(vec![1, 2, 3, 4, 5]);
        b.iter(|| {
            let mut buf = BytesMut::with_capacity(64);
            encode_sexp(black_box(&value), &mut buf);
            buf
        });
    });

    for n in [1_000usize, 100_000] {
        let value = Sexp::doubles((0..n).map(|i| i as f64).collect::<Vec<_>>());
        group.throughput(Throughput::Bytes((n * 8) as u64));
        group.bench_with_input(BenchmarkId::new("double_vector", n), &value, |b, value| {
            b.iter(|| {
                let mut buf = BytesMut::with_capacity(encoded_len(value));
                encode_sexp(black_box(value), &mut buf);
                buf
            });
        });
    }

    group.bench_function("frame_1000_rows", |b| {
        let value = sample_frame(1_000);
        b.iter(|| encode_to_vec(black_box(&value)));
    });

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    group.bench_function("small_int_vector", |b| {
        let bytes = encode_to_vec(&Sexp::integers(vec![1, 2, 3, 4, 5]));
        b.iter(|| decode_sexp(black_box(&bytes)).unwrap());
    });

    for n in [1_000usize, 100_000] {
        let bytes = encode_to_vec(&Sexp::doubles((0..n).map(|i| i as f64).collect::<Vec<_>>()));
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("double_vector", n), &bytes, |b, bytes| {
            b.iter(|| decode_sexp(black_box(bytes)).unwrap());
        });
    }

    group.bench_function("frame_1000_rows", |b| {
        let bytes = encode_to_vec(&sample_frame(1_000));
        b.iter(|| decode_sexp(black_box(&bytes)).unwrap());
    });

    group.finish();
}

fn bench_request_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_framing");

    group.bench_function("eval", |b| {
        b.iter(|| encode_request(CommandId::Eval, &[Arg::String("summary(model)".into())]));
    });

    group.bench_function("assign_frame_100_rows", |b| {
        let value = sample_frame(100);
        b.iter(|| {
            encode_request(
                CommandId::AssignSexp,
                &[
                    Arg::String("df".into()),
                    Arg::Sexp(black_box(&value).clone()),
                ],
            )
        });
    });

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_request_framing);
criterion_main!(benches);
