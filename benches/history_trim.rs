use agentry::agents::background::BackgroundTasks;
use agentry::agents::context::{trim_to_token_budget, ContextManager, InMemorySessionStore};
use agentry::agents::domain::{Message, Role};
use agentry::agents::token::CharRatioCounter;
use agentry::config::ContextSettings;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

fn conversation(turns: usize) -> Vec<Message> {
    let mut messages = vec![Message::system("You are a concise assistant.")];
    for i in 0..turns {
        messages.push(Message::user(format!(
            "Question {} about the quarterly report and its revenue figures",
            i
        )));
        messages.push(Message::assistant(format!(
            "Answer {}: revenue grew steadily, driven by subscriptions and services",
            i
        )));
    }
    messages
}

fn benchmark_trim_to_budget(c: &mut Criterion) {
    let tokenizer = CharRatioCounter::new();
    let mut group = c.benchmark_group("trim_to_token_budget");

    for turns in [10, 100, 1000] {
        let messages = conversation(turns);
        group.throughput(Throughput::Elements(messages.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(turns), &messages, |b, messages| {
            b.iter(|| {
                trim_to_token_budget(black_box(messages), black_box(500), "gpt-4o", &tokenizer)
            });
        });
    }

    group.finish();
}

fn benchmark_get_history(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let manager = ContextManager::new(
        Arc::new(InMemorySessionStore::new()),
        Arc::new(CharRatioCounter::new()),
        BackgroundTasks::new(4),
        ContextSettings::default(),
    );

    rt.block_on(async {
        manager.create_session("t1", "u1", "bench").await.unwrap();
        for message in conversation(200) {
            manager
                .add_message("bench", message.role, &message.content)
                .await
                .unwrap();
        }
    });

    c.bench_function("get_history_limit_20_budget_300", |b| {
        b.iter(|| {
            rt.block_on(async {
                manager
                    .get_history(black_box("bench"), 20, 300, "gpt-4o")
                    .await
                    .unwrap()
            })
        });
    });

    c.bench_function("add_message", |b| {
        b.iter(|| {
            rt.block_on(async {
                manager
                    .add_message("bench", Role::User, black_box("one more question"))
                    .await
                    .unwrap()
            })
        });
    });
}

criterion_group!(benches, benchmark_trim_to_budget, benchmark_get_history);
criterion_main!(benches);
