use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;

use wordtrail_core::{AggregateId, CommandId};
use wordtrail_domain::project::{
    CreateProject, Project, ProjectCommand, ProjectId, UpdateWordCount, WordCountUpdateId,
};
use wordtrail_runtime::{InMemoryEventStore, MessageDispatcher};

fn setup_dispatcher() -> MessageDispatcher<InMemoryEventStore> {
    let mut dispatcher = MessageDispatcher::new(InMemoryEventStore::new());
    dispatcher.register_aggregate::<Project>().unwrap();
    dispatcher
}

fn create_cmd(project_id: ProjectId) -> ProjectCommand {
    ProjectCommand::CreateProject(CreateProject {
        command_id: CommandId::new(),
        project_id,
        name: "Benchmark Project".to_string(),
        start_date: Utc::now(),
        target_completion_date: Utc::now(),
        target_word_count: 120_000,
    })
}

fn update_cmd(project_id: ProjectId, total: u32) -> ProjectCommand {
    ProjectCommand::UpdateWordCount(UpdateWordCount {
        command_id: CommandId::new(),
        project_id,
        word_count_update_id: WordCountUpdateId::new(),
        new_total_word_count: total,
    })
}

fn bench_command_dispatch(c: &mut Criterion) {
    let dispatcher = setup_dispatcher();

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    group.bench_function("create_fresh_aggregate", |b| {
        b.iter(|| {
            let project_id = ProjectId::new(AggregateId::new());
            black_box(dispatcher.send(create_cmd(project_id)).unwrap());
        })
    });

    group.finish();
}

fn bench_replay_cost(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");

    for history_len in [10u32, 100, 1_000] {
        // Build an aggregate with `history_len` word-count updates; every
        // subsequent send replays that history before deciding.
        let dispatcher = setup_dispatcher();
        let project_id = ProjectId::new(AggregateId::new());
        dispatcher.send(create_cmd(project_id)).unwrap();
        for i in 0..history_len {
            dispatcher.send(update_cmd(project_id, i + 1)).unwrap();
        }

        group.throughput(Throughput::Elements(u64::from(history_len)));
        group.bench_with_input(
            BenchmarkId::from_parameter(history_len),
            &history_len,
            |b, _| {
                b.iter(|| {
                    // A regressing total is rejected after the replay, so the
                    // measured work is load + fold without growing the stream.
                    let err = dispatcher.send(update_cmd(project_id, 0)).unwrap_err();
                    black_box(err);
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_command_dispatch, bench_replay_cost);
criterion_main!(benches);
