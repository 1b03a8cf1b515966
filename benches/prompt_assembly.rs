use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hookline_lib::corpus::{Corpus, Sampler};
use hookline_lib::prompt::{render_prior_selections, PromptBuilder};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn bench_prompt_assembly(c: &mut Criterion) {
    let corpus = Corpus::builtin();
    let sampler = Sampler::default();
    let builder = PromptBuilder::default();
    let prior = render_prior_selections(&corpus.examples[..2]);

    c.bench_function("corpus.sample", |b| {
        let mut rng = StdRng::seed_from_u64(7);
        b.iter(|| black_box(corpus.sample(&sampler, &mut rng)));
    });

    c.bench_function("prompt.sample_and_build", |b| {
        let mut rng = StdRng::seed_from_u64(7);
        b.iter(|| {
            let sampled = corpus.sample(&sampler, &mut rng);
            black_box(builder.build(
                "why most morning routines fail",
                &sampled.hooks,
                &sampled.examples,
                prior.as_deref(),
            ))
        });
    });
}

criterion_group!(benches, bench_prompt_assembly);
criterion_main!(benches);
