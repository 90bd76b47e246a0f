use anyhow::{anyhow, Result};
use ndarray::{ArrayBase, Data, Ix2};

pub fn frobenius_norm<S>(mat: &ArrayBase<S, Ix2>) -> f64
where
    S: Data<Elem = f64>,
{
    mat.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// `||exact - approx||_F / ||exact||_F`
pub fn relative_frobenius_error<S, T>(
    exact: &ArrayBase<S, Ix2>,
    approx: &ArrayBase<T, Ix2>,
) -> Result<f64>
where
    S: Data<Elem = f64>,
    T: Data<Elem = f64>,
{
    if exact.dim() != approx.dim() {
        return Err(anyhow!(
            "Shape mismatch. Exact: {:?}, Approx: {:?}",
            exact.dim(),
            approx.dim()
        ));
    }
    let denom = frobenius_norm(exact);
    if denom == 0.0 {
        return Err(anyhow!("Exact matrix has zero norm"));
    }
    let diff = exact
        .iter()
        .zip(approx.iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f64>()
        .sqrt();
    Ok(diff / denom)
}
