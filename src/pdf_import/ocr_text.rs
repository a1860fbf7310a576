//! Repairs for OCR output that splits keywords into spaced letters
//! (`D E P O S I T O` → `DEPOSITO`)

use once_cell::sync::Lazy;
use regex::Regex;

/// Applied in order; all case-insensitive
static OCR_FIXES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"D\s+E\s+POSITO", "DEPOSITO"),
        (r"C\s+O\s+MISION", "COMISION"),
        (r"E\s+N\s+V\s*Í\s*O", "ENVÍO"),
        (r"E\s+N\s+V\s*I\s*O", "ENVIO"),
        (r"T\s+R\s+A\s+S\s+P\s+A\s+S\s+O", "TRASPASO"),
        (r"P\s+A\s+G\s+O", "PAGO"),
        (r"S\s+E\s+R\s+V\s+I\s+C\s+I\s+O", "SERVICIO"),
        (r"D\s+O\s+M\s+I\s+C\s+I\s+L\s+I\s+A\s+C\s+I\s*Ó\s*N", "DOMICILIACIÓN"),
        (r"D\s+E\s+P\s*Ó\s*S\s+I\s+T\s+O", "DEPÓSITO"),
        (r"D\s+E\s+P\s+O\s+S\s+I\s+T\s+O", "DEPOSITO"),
        (r"C\s+O\s+M\s+I\s+S\s+I\s*Ó\s*N", "COMISIÓN"),
        (r"C\s+O\s+M\s+I\s+S\s+I\s+O\s+N", "COMISION"),
        (r"T\s+R\s+A\s+N\s+S\s+F\s+E\s+R\s+E\s+N\s+C\s+I\s+A", "TRANSFERENCIA"),
        (r"I\s+V\s+A", "IVA"),
        (r"R\s+E\s+T\s+I\s+R\s+O", "RETIRO"),
        (r"B\s+E\s+N\s+E\s+F\s+I\s+C\s+I\s+A\s+R\s+I\s+O", "BENEFICIARIO"),
        (r"I\s+N\s+S\s+T\s+I\s+T\s+U\s+C\s+I\s*Ó\s*N", "INSTITUCIÓN"),
        (r"R\s+E\s+C\s+E\s+P\s+T\s+O\s+R\s+A", "RECEPTORA"),
        (r"C\s+U\s+E\s+N\s+T\s+A", "CUENTA"),
        (r"R\s+E\s+F\s+E\s+R\s+E\s+N\s+C\s+I\s+A", "REFERENCIA"),
        (r"C\s+L\s+A\s+V\s+E", "CLAVE"),
        (r"R\s+A\s+S\s+T\s+R\s+E\s+O", "RASTREO"),
        (r"H\s+O\s+R\s+A", "HORA"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(&format!("(?i){}", pattern)).unwrap(),
            replacement,
        )
    })
    .collect()
});

/// Collapse letter-spaced domain keywords
pub fn normalize_ocr_text(text: &str) -> String {
    OCR_FIXES
        .iter()
        .fold(text.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spaced_keywords() {
        assert_eq!(normalize_ocr_text("D E P O S I T O SPEI"), "DEPOSITO SPEI");
        assert_eq!(normalize_ocr_text("E N V I O SPEI"), "ENVIO SPEI");
        assert_eq!(normalize_ocr_text("c o m i s i o n por manejo"), "COMISION por manejo");
        assert_eq!(normalize_ocr_text("D E POSITO"), "DEPOSITO");
    }

    #[test]
    fn test_clean_text_unchanged() {
        let clean = "15 ENE DEPOSITO SPEI RECIBIDO $ 1,000.00 $ 5,000.00";
        assert_eq!(normalize_ocr_text(clean), clean);
    }
}
