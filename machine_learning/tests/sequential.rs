mod common;

use machine_learning::{Elm, MlErr, Oselm, arch::Model};
use ndarray::s;

use common::{batches, max_abs_diff, separable};

#[test]
fn updates_match_a_single_batch_fit() -> Result<(), MlErr> {
    let (x, y) = separable(100, 5, 21);

    let mut elm = Elm::new(40, 0.1)?;
    elm.set_seed(3);
    elm.train(x.view(), y.view())?;

    let mut oselm = Oselm::new(40, 0.1)?;
    oselm.set_seed(3);
    oselm.init_train(x.slice(s![..60, ..]), y.slice(s![..60, ..]))?;

    let tail_x = x.slice(s![60.., ..]).to_owned();
    let tail_y = y.slice(s![60.., ..]).to_owned();
    for (bx, by) in batches(&tail_x, &tail_y, 20) {
        oselm.update(bx, by)?;
    }

    assert_eq!(oselm.elm().weight(), elm.weight());

    let scale = elm.beta().iter().fold(1_f64, |m, b| m.max(b.abs()));
    let diff = max_abs_diff(oselm.beta(), elm.beta());
    assert!(diff < 1e-6 * scale, "beta differs by {diff}");
    Ok(())
}

#[test]
fn batch_size_does_not_change_the_result() -> Result<(), MlErr> {
    let (x, y) = separable(90, 3, 22);
    let head = (x.slice(s![..30, ..]), y.slice(s![..30, ..]));
    let tail_x = x.slice(s![30.., ..]).to_owned();
    let tail_y = y.slice(s![30.., ..]).to_owned();

    let run = |size: usize| -> Result<Oselm, MlErr> {
        let mut oselm = Oselm::new(25, 0.5)?;
        oselm.set_seed(17);
        oselm.init_train(head.0, head.1)?;
        for (bx, by) in batches(&tail_x, &tail_y, size) {
            oselm.update(bx, by)?;
        }
        Ok(oselm)
    };

    let one = run(1)?;
    let seven = run(7)?;
    let all = run(60)?;

    assert!(max_abs_diff(one.beta(), all.beta()) < 1e-6);
    assert!(max_abs_diff(seven.beta(), all.beta()) < 1e-6);
    assert!(max_abs_diff(one.aux_matrix(), all.aux_matrix()) < 1e-6);
    Ok(())
}

#[test]
fn aux_matrix_stays_symmetric() -> Result<(), MlErr> {
    let (x, y) = separable(120, 4, 23);

    let mut oselm = Oselm::new(30, 0.2)?;
    oselm.init_train(x.slice(s![..40, ..]), y.slice(s![..40, ..]))?;

    let tail_x = x.slice(s![40.., ..]).to_owned();
    let tail_y = y.slice(s![40.., ..]).to_owned();
    for (bx, by) in batches(&tail_x, &tail_y, 16) {
        oselm.update(bx, by)?;
    }

    let p = oselm.aux_matrix();
    assert!(max_abs_diff(p, p.t()) < 1e-9);
    assert!(p.diag().iter().all(|&d| d > 0.));
    Ok(())
}

#[test]
fn init_train_starts_over() -> Result<(), MlErr> {
    let (x, y) = separable(60, 4, 24);

    let mut oselm = Oselm::new(20, 0.1)?;
    oselm.set_seed(5);
    oselm.init_train(x.slice(s![..30, ..]), y.slice(s![..30, ..]))?;
    oselm.update(x.slice(s![30.., ..]), y.slice(s![30.., ..]))?;

    oselm.set_seed(5);
    oselm.init_train(x.slice(s![..30, ..]), y.slice(s![..30, ..]))?;

    let mut fresh = Oselm::new(20, 0.1)?;
    fresh.set_seed(5);
    fresh.init_train(x.slice(s![..30, ..]), y.slice(s![..30, ..]))?;

    assert_eq!(oselm.beta(), fresh.beta());
    assert_eq!(oselm.aux_matrix(), fresh.aux_matrix());
    Ok(())
}
