use criterion::{Criterion, criterion_group, criterion_main};
use pdfmill::{Config, Context, Dictionary, Object, dictionary};

fn built_context(objects: u32, config: Config) -> Context {
    let mut ctx = Context::new(config);
    let mut kids = Vec::new();
    let pages_id = ctx.add_object(Dictionary::new());
    for i in 0..objects {
        let page = ctx.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Index" => i,
        });
        kids.push(Object::Reference(page));
    }
    let count = kids.len();
    ctx.set_object(
        pages_id,
        dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        },
    );
    let catalog = ctx.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    ctx.trailer.set("Root", Object::Reference(catalog));
    ctx
}

fn bench_save_classical(c: &mut Criterion) {
    let config = Config {
        write_object_stream: false,
        write_xref_stream: false,
        ..Config::default()
    };
    c.bench_function("save_classical", |b| {
        b.iter(|| {
            let mut ctx = built_context(200, config.clone());
            ctx.render().unwrap();
        })
    });
}

fn bench_save_object_streams(c: &mut Criterion) {
    c.bench_function("save_object_streams", |b| {
        b.iter(|| {
            let mut ctx = built_context(200, Config::default());
            ctx.render().unwrap();
        })
    });
}

criterion_group!(benches, bench_save_classical, bench_save_object_streams);
criterion_main!(benches);
