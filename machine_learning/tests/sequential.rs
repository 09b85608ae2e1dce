use std::{num::NonZeroUsize, sync::Arc, thread};

use comms::{Communicator, LocalGroup, SelfComm};
use data_reader::ReaderConfig;
use machine_learning::{
    MlErr,
    arch::{Activation, LayerSpec, MetricKind, Model, ModelSpec, ObjectiveTerm, Sequential},
    driver::{GradCheckConfig, SyntheticData, build_model, run_participant},
    gradient_check::{CheckGradients, CheckGradientsConfig},
    optimization::OptimizerSpec,
    weights::WeightInit,
};

// 3x4 kernel + 4 bias + 4x2 kernel + 2 bias.
const ENTRIES: usize = 26;

fn config(participants: usize) -> GradCheckConfig {
    let mut reader = ReaderConfig::new(NonZeroUsize::new(6).unwrap());
    reader.seed = 3;

    GradCheckConfig {
        participants: NonZeroUsize::new(participants).unwrap(),
        data: SyntheticData {
            samples: 12,
            features: 3,
            responses: 2,
            noise: 0.05,
            seed: 11,
        },
        reader,
        model: ModelSpec {
            layers: vec![
                LayerSpec::Dense {
                    outputs: 4,
                    activation: Some(Activation::Sigmoid { amp: 1. }),
                    bias: true,
                    init: WeightInit::XavierUniform,
                    trainable: true,
                },
                LayerSpec::Dense {
                    outputs: 2,
                    activation: None,
                    bias: true,
                    init: WeightInit::Normal {
                        mean: 0.,
                        std_dev: 0.5,
                    },
                    trainable: true,
                },
            ],
            objective: vec![
                ObjectiveTerm::MeanSquaredError { scale: 1. },
                ObjectiveTerm::L2WeightRegularization { scale: 1e-3 },
            ],
            metrics: vec![MetricKind::MeanAbsoluteError],
            optimizer: OptimizerSpec::GradientDescent {
                learning_rate: 0.05,
            },
            seed: 17,
        },
        warmup_steps: 2,
        check: CheckGradientsConfig {
            error_on_failure: true,
            ..Default::default()
        },
    }
}

fn weight_bits(model: &Sequential) -> Vec<Vec<u64>> {
    (0..model.num_weights())
        .filter_map(|i| model.weights(i))
        .map(|w| w.values().local().iter().map(|x| x.to_bits()).collect())
        .collect()
}

fn warm_up(model: &mut Sequential, steps: usize) {
    for _ in 0..steps {
        model.train_step().unwrap();
    }
}

#[test]
fn dense_network_passes_on_a_single_participant() {
    let config = config(1);
    let mut model = build_model(Arc::new(SelfComm), &config).unwrap();
    warm_up(&mut model, config.warmup_steps);

    let before = weight_bits(&model);
    let check = CheckGradients::new(config.check.clone()).unwrap();

    let report = check.check(&mut model).unwrap().unwrap();
    assert!(report.passed(), "{:?}", report.failures);
    assert_eq!(report.checked, ENTRIES);
    assert_eq!(weight_bits(&model), before);

    // The readers are rewound, so a second check sees the same mini-batch.
    let again = check.check(&mut model).unwrap().unwrap();
    assert_eq!(again.objective.to_bits(), report.objective.to_bits());
    assert!(model.objective().statistics(model.execution_mode()).is_none());
}

#[test]
fn dense_network_passes_on_several_participants() {
    let config = config(3);
    let comms = LocalGroup::new(config.participants);

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let config = &config;
                s.spawn(move || {
                    let mut model = build_model(Arc::new(comm), config).unwrap();
                    warm_up(&mut model, config.warmup_steps);

                    let before = weight_bits(&model);
                    let check = CheckGradients::new(config.check.clone()).unwrap();
                    let report = check.check(&mut model).unwrap().unwrap();

                    (report, before == weight_bits(&model))
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(results.iter().all(|(report, _)| report.passed()));
    assert!(results.iter().all(|(_, untouched)| *untouched));
    assert_eq!(results.iter().map(|(r, _)| r.checked).sum::<usize>(), ENTRIES);
    assert!(
        results
            .windows(2)
            .all(|w| w[0].0.objective.to_bits() == w[1].0.objective.to_bits())
    );

    let mut single = build_model(Arc::new(SelfComm), &config).unwrap();
    warm_up(&mut single, config.warmup_steps);
    let single = CheckGradients::new(config.check.clone())
        .unwrap()
        .check(&mut single)
        .unwrap()
        .unwrap();

    assert!((single.objective - results[0].0.objective).abs() < 1e-9);
}

#[test]
fn driver_runs_every_participant() {
    let config = config(2);
    let comms = LocalGroup::new(config.participants);

    let reports: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let config = &config;
                s.spawn(move || {
                    let comm: Arc<dyn Communicator> = Arc::new(comm);
                    run_participant(comm, config).unwrap().unwrap()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(reports.iter().map(|r| r.checked).sum::<usize>(), ENTRIES);
    assert!(reports.iter().all(|r| r.passed()));
}

#[test]
fn train_step_walks_the_epoch() {
    let config = config(1);
    let mut model = build_model(Arc::new(SelfComm), &config).unwrap();

    let first = model.train_step().unwrap();
    let second = model.train_step().unwrap();

    assert!(!first.epoch_done);
    assert!(second.epoch_done);
    assert!(first.objective.is_finite() && second.objective.is_finite());

    let mode = model.execution_mode();
    assert!(model.objective().statistics(mode).is_some());
    assert!(model.metrics()[0].statistics(mode).is_some());
}

#[test]
fn back_prop_needs_a_differentiated_objective() {
    let config = config(1);
    let mut model = build_model(Arc::new(SelfComm), &config).unwrap();

    assert!(matches!(
        model.back_prop_layer(2),
        Err(MlErr::InvalidState(_))
    ));
}

#[test]
fn inconsistent_specs_are_rejected() {
    let mut no_layers = config(1);
    no_layers.model.layers.clear();

    let mut wrong_outputs = config(1);
    wrong_outputs.model.layers.pop();

    for config in [no_layers, wrong_outputs] {
        assert!(matches!(
            build_model(Arc::new(SelfComm), &config),
            Err(MlErr::Configuration(_))
        ));
    }
}
