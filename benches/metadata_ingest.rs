use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use rskafka_topicmap::{
    Broker, Client, ClientConfig, ClientRole, MetadataError, MetadataSnapshot, PartitionMeta,
};

fn make_snapshot(topic_name: &str, partition_cnt: i32) -> MetadataSnapshot {
    MetadataSnapshot {
        topic_name: Arc::from(topic_name),
        error: MetadataError::NoError,
        partitions: (0..partition_cnt)
            .map(|id| PartitionMeta {
                id,
                leader_id: id % 4,
            })
            .collect(),
    }
}

fn bench_apply_metadata_cold(c: &mut Criterion) {
    c.bench_function("apply_metadata_initial_grow_32_partitions", |b| {
        b.iter_batched(
            || {
                let (client, _rx) = Client::new(ClientConfig::new(ClientRole::Producer));
                client.update_brokers((0..4).map(|id| Broker {
                    id,
                    host: format!("broker-{id}"),
                    port: 9092,
                }));
                client.topic_new("orders", None).unwrap();
                client
            },
            |client| {
                client
                    .apply_metadata(black_box(make_snapshot("orders", 32)))
                    .unwrap()
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_apply_metadata_reapply(c: &mut Criterion) {
    c.bench_function("apply_metadata_reapply_unchanged_32_partitions", |b| {
        let (client, _rx) = Client::new(ClientConfig::new(ClientRole::Producer));
        client.update_brokers((0..4).map(|id| Broker {
            id,
            host: format!("broker-{id}"),
            port: 9092,
        }));
        client.topic_new("orders", None).unwrap();
        client
            .apply_metadata(make_snapshot("orders", 32))
            .unwrap();

        b.iter(|| {
            client
                .apply_metadata(black_box(make_snapshot("orders", 32)))
                .unwrap()
        });
    });
}

fn bench_apply_metadata_many_topics(c: &mut Criterion) {
    c.bench_function("apply_metadata_across_100_topics", |b| {
        b.iter_batched(
            || {
                let (client, _rx) = Client::new(ClientConfig::new(ClientRole::Producer));
                client.update_brokers((0..4).map(|id| Broker {
                    id,
                    host: format!("broker-{id}"),
                    port: 9092,
                }));
                let names: Vec<String> = (0..100).map(|i| format!("topic-{i}")).collect();
                for name in &names {
                    client.topic_new(name, None).unwrap();
                }
                (client, names)
            },
            |(client, names)| {
                for name in &names {
                    client
                        .apply_metadata(black_box(make_snapshot(name, 8)))
                        .unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_scan(c: &mut Criterion) {
    c.bench_function("scan_100_idle_topics", |b| {
        b.iter_batched(
            || {
                let (client, _rx) = Client::new(ClientConfig::new(ClientRole::Producer));
                client.update_brokers((0..4).map(|id| Broker {
                    id,
                    host: format!("broker-{id}"),
                    port: 9092,
                }));
                for i in 0..100 {
                    let name = format!("topic-{i}");
                    client.topic_new(&name, None).unwrap();
                    client
                        .apply_metadata(make_snapshot(&name, 8))
                        .unwrap();
                }
                client
            },
            |client| client.scan(black_box(std::time::Instant::now())),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    bench_apply_metadata_cold,
    bench_apply_metadata_reapply,
    bench_apply_metadata_many_topics,
    bench_scan
);
criterion_main!(benches);
