//! Utilities.
use anyhow::{bail, Context, Result};
use candle_core::{Device, Tensor};
use candle_nn::VarMap;
use log::trace;
use std::{collections::HashMap, path::Path};

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    trace!("dest");
    let dest = dest.data().lock().unwrap();
    trace!("src");
    let src = src.data().lock().unwrap();

    dest.iter().for_each(|(k_dest, v_dest)| {
        let v_src = src.get(k_dest).unwrap();
        let t_src = v_src.as_tensor();
        let t_dest = v_dest.as_tensor();
        let t_dest = ((tau * t_src).unwrap() + (1.0 - tau) * t_dest).unwrap();
        v_dest.set(&t_dest).unwrap();
    });

    Ok(())
}

/// Index of the maximum element of a 1-dimensional tensor.
pub fn flat_argmax(t: &Tensor) -> Result<usize> {
    let v = t.flatten_all()?.to_vec1::<f32>()?;
    if v.is_empty() {
        bail!("flat_argmax on an empty tensor");
    }
    let mut ix = 0;
    for (i, x) in v.iter().enumerate() {
        if *x > v[ix] {
            ix = i;
        }
    }
    Ok(ix)
}

/// Saves several variable maps into a single safetensors file.
///
/// Variable names are prefixed with `<prefix>.` so that the maps can be
/// told apart when loading.
pub fn save_bundle(maps: &[(&str, &VarMap)], path: impl AsRef<Path>) -> Result<()> {
    let mut tensors = HashMap::new();
    for (prefix, varmap) in maps.iter() {
        for (k, v) in varmap.data().lock().unwrap().iter() {
            tensors.insert(format!("{}.{}", prefix, k), v.as_tensor().clone());
        }
    }
    candle_core::safetensors::save(&tensors, path)?;
    Ok(())
}

/// Restores variable maps from a safetensors file written by [`save_bundle`].
pub fn load_bundle(maps: &[(&str, &VarMap)], path: impl AsRef<Path>, device: &Device) -> Result<()> {
    let tensors = candle_core::safetensors::load(path.as_ref(), device)?;
    for (prefix, varmap) in maps.iter() {
        for (k, v) in varmap.data().lock().unwrap().iter() {
            let key = format!("{}.{}", prefix, k);
            let t = tensors
                .get(&key)
                .with_context(|| format!("Variable {} not found in {:?}", key, path.as_ref()))?;
            v.set(t)?;
        }
    }
    Ok(())
}

/// Converts a batch of flat observations into a `(batch, dim)` tensor.
pub fn obs_to_tensor(obs: &[Vec<f32>], device: &Device) -> Result<Tensor> {
    let batch_size = obs.len();
    let dim = obs[0].len();
    let flat: Vec<f32> = obs.iter().flatten().copied().collect();
    Ok(Tensor::from_slice(&flat[..], (batch_size, dim), device)?)
}

/// Converts a batch of rewards into a `(batch,)` tensor.
pub fn reward_to_tensor(reward: &[f32], device: &Device) -> Result<Tensor> {
    Ok(Tensor::from_slice(reward, (reward.len(),), device)?)
}

/// Converts termination flags into a `(batch,)` float tensor of zeros and ones.
pub fn done_to_tensor(is_terminated: &[i8], device: &Device) -> Result<Tensor> {
    let v: Vec<f32> = is_terminated.iter().map(|e| *e as f32).collect();
    Ok(Tensor::from_slice(&v[..], (v.len(),), device)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::Init;
    use tempdir::TempDir;

    fn varmap_with(name: &str, values: &[f32]) -> Result<VarMap> {
        let vm = VarMap::new();
        let init = Init::Randn {
            mean: 0.0,
            stdev: 1.0,
        };
        vm.get((values.len(),), name, init, DType::F32, &Device::Cpu)?;
        let t = Tensor::from_slice(values, (values.len(),), &Device::Cpu)?;
        vm.data().lock().unwrap().get(name).unwrap().set(&t)?;
        Ok(vm)
    }

    fn values_of(vm: &VarMap, name: &str) -> Vec<f32> {
        vm.data()
            .lock()
            .unwrap()
            .get(name)
            .unwrap()
            .as_tensor()
            .to_vec1::<f32>()
            .unwrap()
    }

    #[test]
    fn test_track() -> Result<()> {
        let tau = 0.7;
        let vm_src = varmap_with("var1", &[1.0, 2.0, 3.0])?;
        let vm_dest = varmap_with("var1", &[4.0, 5.0, 6.0])?;

        track(&vm_dest, &vm_src, tau)?;

        let got = values_of(&vm_dest, "var1");
        let want = [
            0.7 * 1.0 + 0.3 * 4.0,
            0.7 * 2.0 + 0.3 * 5.0,
            0.7 * 3.0 + 0.3 * 6.0,
        ];
        for (g, w) in got.iter().zip(want.iter()) {
            assert!((g - w).abs() < 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_track_tau_zero_keeps_dest() -> Result<()> {
        let vm_src = varmap_with("var1", &[1.0, 2.0, 3.0])?;
        let vm_dest = varmap_with("var1", &[4.0, 5.0, 6.0])?;
        track(&vm_dest, &vm_src, 0.0)?;
        assert_eq!(values_of(&vm_dest, "var1"), vec![4.0, 5.0, 6.0]);
        Ok(())
    }

    #[test]
    fn test_track_tau_one_copies() -> Result<()> {
        let vm_src = varmap_with("var1", &[1.0, 2.0, 3.0])?;
        let vm_dest = varmap_with("var1", &[4.0, 5.0, 6.0])?;
        track(&vm_dest, &vm_src, 1.0)?;
        assert_eq!(values_of(&vm_dest, "var1"), vec![1.0, 2.0, 3.0]);
        Ok(())
    }

    #[test]
    fn test_flat_argmax() -> Result<()> {
        let t = Tensor::from_slice(&[0.1f32, 0.7, 0.3], (3,), &Device::Cpu)?;
        assert_eq!(flat_argmax(&t)?, 1);
        Ok(())
    }

    #[test]
    fn test_bundle_roundtrip() -> Result<()> {
        let dir = TempDir::new("bundle")?;
        let path = dir.path().join("model_weights.pth");

        let vm_a = varmap_with("var1", &[1.0, 2.0])?;
        let vm_b = varmap_with("var1", &[3.0, 4.0])?;
        save_bundle(&[("oc", &vm_a), ("oc_target", &vm_b)], &path)?;

        let vm_a2 = varmap_with("var1", &[0.0, 0.0])?;
        let vm_b2 = varmap_with("var1", &[0.0, 0.0])?;
        load_bundle(&[("oc", &vm_a2), ("oc_target", &vm_b2)], &path, &Device::Cpu)?;

        assert_eq!(values_of(&vm_a2, "var1"), vec![1.0, 2.0]);
        assert_eq!(values_of(&vm_b2, "var1"), vec![3.0, 4.0]);
        Ok(())
    }

    #[test]
    fn test_load_bundle_missing_file_fails() {
        let vm = varmap_with("var1", &[0.0]).unwrap();
        let r = load_bundle(&[("oc", &vm)], "no_such_file.pth", &Device::Cpu);
        assert!(r.is_err());
    }
}
