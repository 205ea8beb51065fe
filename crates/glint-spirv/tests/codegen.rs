//! End-to-end code generation: GLSL text through the checker and binding
//! mapper into SPIR-V, inspected instruction by instruction.

use glint_parse::parse_str;
use glint_spirv::binary::literal_string;
use glint_spirv::{generate, BinaryModule, GENERATOR};
use glint_types::{map_bindings, CapabilityProfile, TypeChecker};
use rspirv::spirv::{BuiltIn, Capability, Decoration, ExecutionMode, ExecutionModel, Op, StorageClass};

fn compile(src: &str) -> BinaryModule {
    let profile = CapabilityProfile::default();
    let unit = parse_str(src, &profile.limits)
        .unwrap_or_else(|e| panic!("parse failed: {:?}", e))
        .value;
    let mut program = TypeChecker::new(&profile)
        .check(&unit)
        .unwrap_or_else(|e| panic!("check failed: {:?}", e))
        .value;
    map_bindings(&mut program).unwrap_or_else(|e| panic!("link failed: {:?}", e));
    generate(&program).unwrap_or_else(|d| panic!("codegen failed: {:?}", d))
}

fn ops(m: &BinaryModule) -> Vec<(Op, Vec<u32>)> {
    m.instructions()
        .map(|i| {
            let i = i.expect("well-formed instruction");
            (i.op().expect("known opcode"), i.operands.to_vec())
        })
        .collect()
}

fn count(m: &BinaryModule, op: Op) -> usize {
    ops(m).iter().filter(|(o, _)| *o == op).count()
}

fn capabilities(m: &BinaryModule) -> Vec<u32> {
    ops(m)
        .into_iter()
        .filter(|(o, _)| *o == Op::Capability)
        .map(|(_, operands)| operands[0])
        .collect()
}

fn names(m: &BinaryModule) -> Vec<String> {
    ops(m)
        .into_iter()
        .filter(|(o, _)| *o == Op::Name)
        .map(|(_, operands)| literal_string(&operands[1..]))
        .collect()
}

fn id_named(m: &BinaryModule, name: &str) -> u32 {
    ops(m)
        .into_iter()
        .find(|(o, operands)| *o == Op::Name && literal_string(&operands[1..]) == name)
        .map(|(_, operands)| operands[0])
        .unwrap_or_else(|| panic!("no OpName '{}'", name))
}

fn decorations(m: &BinaryModule, target: u32) -> Vec<Vec<u32>> {
    ops(m)
        .into_iter()
        .filter(|(o, operands)| *o == Op::Decorate && operands[0] == target)
        .map(|(_, operands)| operands[1..].to_vec())
        .collect()
}

#[test]
fn minimal_module_header_and_entry_point() {
    let m = compile("layout(local_size_x = 8, local_size_y = 4) in;\nvoid main() {}\n");
    let h = m.header();
    assert_eq!(h.magic, 0x0723_0203);
    assert_eq!(h.version_pair(), (1, 0));
    assert_eq!(h.generator, GENERATOR);
    assert_eq!(h.schema, 0);

    let all = ops(&m);
    let max_id = all
        .iter()
        .filter(|(o, _)| *o == Op::Name)
        .map(|(_, operands)| operands[0])
        .max()
        .unwrap();
    assert!(h.bound > max_id);

    assert_eq!(capabilities(&m), vec![Capability::Shader as u32]);
    assert_eq!(count(&m, Op::ExtInstImport), 0);

    let (_, entry) = all.iter().find(|(o, _)| *o == Op::EntryPoint).unwrap();
    assert_eq!(entry[0], ExecutionModel::GLCompute as u32);
    assert_eq!(literal_string(&entry[2..]), "main");
    assert_eq!(entry[1], id_named(&m, "main"));

    let (_, mode) = all.iter().find(|(o, _)| *o == Op::ExecutionMode).unwrap();
    assert_eq!(&mode[1..], &[ExecutionMode::LocalSize as u32, 8, 4, 1]);
}

#[test]
fn default_local_size_is_one() {
    let m = compile("void main() {}\n");
    let (_, mode) = ops(&m).into_iter().find(|(o, _)| *o == Op::ExecutionMode).unwrap();
    assert_eq!(&mode[2..], &[1, 1, 1]);
}

#[test]
fn output_is_deterministic() {
    let src = "layout(local_size_x = 64) in;\n\
               layout(std430, binding = 0) buffer Data { float v[]; } data;\n\
               float twice(float x) { return x * 2.0; }\n\
               void main() { uint i = gl_GlobalInvocationID.x; data.v[i] = twice(sqrt(data.v[i])); }\n";
    assert_eq!(compile(src).words(), compile(src).words());
}

#[test]
fn rspirv_loads_generated_modules() {
    let src = "layout(local_size_x = 16) in;\n\
               layout(std430, binding = 0) buffer Data { uint count; vec4 items[]; } data;\n\
               shared float tile[16];\n\
               void accumulate(inout vec4 acc, in vec4 x, out bool big) { acc += x; big = length(x) > 2.0; }\n\
               void main() {\n\
                 uint i = gl_LocalInvocationIndex;\n\
                 tile[i] = float(i);\n\
                 barrier();\n\
                 vec4 acc = vec4(0.0);\n\
                 bool big;\n\
                 for (int k = 0; k < 4; ++k) {\n\
                   if (k == 2) continue;\n\
                   accumulate(acc, data.items[k], big);\n\
                   if (big) break;\n\
                 }\n\
                 switch (int(i) % 3) { case 0: acc.x = 1.0; case 1: acc.yz = vec2(2.0); break; default: acc = -acc; }\n\
                 do { acc *= 0.5; } while (acc.w > 1.0 && tile[0] < 3.0);\n\
                 data.items[i] = i < 8u ? acc : vec4(tile[i]);\n\
                 atomicAdd(data.count, 1u);\n\
               }\n";
    let m = compile(src);
    let module = rspirv::dr::load_words(m.words()).expect("rspirv parses the module");
    assert_eq!(module.entry_points.len(), 1);
    assert_eq!(module.functions.len(), 2);

    assert_eq!(count(&m, Op::LoopMerge), 2);
    assert_eq!(count(&m, Op::Switch), 1);
    assert_eq!(count(&m, Op::ControlBarrier), 1);
    assert_eq!(count(&m, Op::AtomicIAdd), 1);
    assert_eq!(count(&m, Op::FunctionCall), 1);
    // `&&` and the ternary both merge through a phi
    assert_eq!(count(&m, Op::Phi), 2);
}

#[test]
fn glsl_import_only_when_used() {
    let plain = compile("void main() { float x = 2.0; x = x * x; }\n");
    assert_eq!(count(&plain, Op::ExtInstImport), 0);

    let m = compile("void main() { float x = 2.0; x = sqrt(x) + clamp(x, 0.0, 1.0); }\n");
    let imports: Vec<_> = ops(&m).into_iter().filter(|(o, _)| *o == Op::ExtInstImport).collect();
    assert_eq!(imports.len(), 1);
    assert_eq!(literal_string(&imports[0].1[1..]), "GLSL.std.450");
    assert_eq!(count(&m, Op::ExtInst), 2);
}

#[test]
fn capabilities_follow_features() {
    let m = compile("void main() { double d = 1.0; d = d * 2.0; }\n");
    assert_eq!(
        capabilities(&m),
        vec![Capability::Shader as u32, Capability::Float64 as u32]
    );

    let m = compile(
        "layout(r32f, binding = 0) uniform readonly image2D img;\n\
         void main() { ivec2 s = imageSize(img); }\n",
    );
    assert_eq!(
        capabilities(&m),
        vec![Capability::Shader as u32, Capability::ImageQuery as u32]
    );

    let m = compile(
        "layout(rg16f, binding = 0) uniform writeonly image1D img;\n\
         void main() { imageStore(img, 0, vec4(1.0)); }\n",
    );
    let caps = capabilities(&m);
    assert!(caps.contains(&(Capability::Image1D as u32)));
    assert!(caps.contains(&(Capability::StorageImageExtendedFormats as u32)));
    assert!(!caps.contains(&(Capability::ImageQuery as u32)));
}

#[test]
fn block_and_resource_decorations() {
    let src = "layout(std430, set = 1, binding = 3) buffer Data { uint count; float values[]; } data;\n\
               layout(std140, binding = 0) uniform Params { vec3 scale; mat4 xf; };\n\
               layout(rgba8, binding = 1) uniform restrict writeonly image2D img;\n\
               void main() { data.values[data.count] = scale.x + xf[0][0]; }\n";
    let m = compile(src);

    let data = id_named(&m, "data");
    let decos = decorations(&m, data);
    assert!(decos.contains(&vec![Decoration::DescriptorSet as u32, 1]));
    assert!(decos.contains(&vec![Decoration::Binding as u32, 3]));

    let block = id_named(&m, "Data");
    assert!(decorations(&m, block).contains(&vec![Decoration::BufferBlock as u32]));
    let params = id_named(&m, "Params");
    assert!(decorations(&m, params).contains(&vec![Decoration::Block as u32]));

    let member = |target: u32, member: u32, d: Decoration| -> Option<Vec<u32>> {
        ops(&m)
            .into_iter()
            .find(|(o, x)| *o == Op::MemberDecorate && x[0] == target && x[1] == member && x[2] == d as u32)
            .map(|(_, x)| x[3..].to_vec())
    };
    assert_eq!(member(block, 0, Decoration::Offset), Some(vec![0]));
    assert_eq!(member(block, 1, Decoration::Offset), Some(vec![4]));
    assert_eq!(member(params, 1, Decoration::Offset), Some(vec![16]));
    assert_eq!(member(params, 1, Decoration::MatrixStride), Some(vec![16]));
    assert_eq!(member(params, 1, Decoration::ColMajor), Some(vec![]));

    let strides: Vec<u32> = ops(&m)
        .into_iter()
        .filter(|(o, x)| *o == Op::Decorate && x[1] == Decoration::ArrayStride as u32)
        .map(|(_, x)| x[2])
        .collect();
    assert_eq!(strides, vec![4]);

    let img = id_named(&m, "img");
    let decos = decorations(&m, img);
    assert!(decos.contains(&vec![Decoration::Restrict as u32]));
    assert!(decos.contains(&vec![Decoration::NonReadable as u32]));
    assert!(decos.contains(&vec![Decoration::Binding as u32, 1]));
}

#[test]
fn builtins_join_the_entry_point_interface() {
    let m = compile(
        "layout(std430, binding = 0) buffer Out { uvec3 ids[]; } o;\n\
         void main() { o.ids[gl_LocalInvocationIndex] = gl_GlobalInvocationID + gl_WorkGroupID; }\n",
    );
    let gid = id_named(&m, "gl_GlobalInvocationID");
    assert!(decorations(&m, gid).contains(&vec![Decoration::BuiltIn as u32, BuiltIn::GlobalInvocationId as u32]));
    let wid = id_named(&m, "gl_WorkGroupID");
    assert!(decorations(&m, wid).contains(&vec![Decoration::BuiltIn as u32, BuiltIn::WorkgroupId as u32]));

    let (_, entry) = ops(&m).into_iter().find(|(o, _)| *o == Op::EntryPoint).unwrap();
    // "main" packs into two words after the model and function operands
    let interface = &entry[4..];
    assert_eq!(interface.len(), 3);
    assert!(interface.contains(&gid));
    assert!(interface.contains(&wid));

    let inputs = ops(&m)
        .into_iter()
        .filter(|(o, x)| *o == Op::Variable && x.len() == 3 && x[2] == StorageClass::Input as u32)
        .count();
    assert_eq!(inputs, 3);
}

#[test]
fn unreachable_functions_are_not_emitted() {
    let m = compile(
        "float unused(float x) { return x; }\n\
         float used(float x) { return x + 1.0; }\n\
         void main() { float y = used(1.0); }\n",
    );
    let n = names(&m);
    assert!(n.contains(&"used".to_string()));
    assert!(!n.contains(&"unused".to_string()));
    assert_eq!(count(&m, Op::Function), 2);
}

#[test]
fn shared_memory_and_private_globals() {
    let m = compile(
        "layout(local_size_x = 32) in;\n\
         shared uint counts[32];\n\
         float bias = 0.5;\n\
         void main() { counts[gl_LocalInvocationIndex] = 0u; memoryBarrierShared(); bias += 1.0; }\n",
    );
    let class_of = |name: &str| {
        let id = id_named(&m, name);
        ops(&m)
            .into_iter()
            .find(|(o, x)| *o == Op::Variable && x[1] == id)
            .map(|(_, x)| x[2])
    };
    assert_eq!(class_of("counts"), Some(StorageClass::Workgroup as u32));
    assert_eq!(class_of("bias"), Some(StorageClass::Private as u32));
    assert_eq!(count(&m, Op::MemoryBarrier), 1);
    assert_eq!(count(&m, Op::ControlBarrier), 0);
}

#[test]
fn conversions_use_the_matching_opcodes() {
    let m = compile(
        "void main() {\n\
           int i = -3; uint u = 7u; float f = 1.5;\n\
           float a = float(i) + float(u);\n\
           int b = int(f); uint c = uint(i);\n\
           bool z = bool(u);\n\
           f = a + float(b) + float(c) + float(z);\n\
         }\n",
    );
    assert_eq!(count(&m, Op::ConvertSToF), 2);
    assert_eq!(count(&m, Op::ConvertUToF), 2);
    assert_eq!(count(&m, Op::ConvertFToS), 1);
    assert_eq!(count(&m, Op::Bitcast), 1);
    assert_eq!(count(&m, Op::INotEqual), 1);
    assert_eq!(count(&m, Op::Select), 1);
}

#[test]
fn matrix_arithmetic() {
    let m = compile(
        "void main() {\n\
           mat3 m = mat3(2.0);\n\
           vec3 v = m * vec3(1.0, 2.0, 3.0);\n\
           mat3 n = m * m + m;\n\
           v = v * n;\n\
         }\n",
    );
    assert_eq!(count(&m, Op::MatrixTimesVector), 1);
    assert_eq!(count(&m, Op::MatrixTimesMatrix), 1);
    assert_eq!(count(&m, Op::VectorTimesMatrix), 1);
    // matrix addition is done column by column
    assert_eq!(count(&m, Op::FAdd), 3);
}

#[test]
fn initializer_for_a_missing_local_is_a_codegen_error() {
    let profile = CapabilityProfile::default();
    let unit = parse_str("void main() { int a = 1; }", &profile.limits)
        .unwrap_or_else(|e| panic!("parse failed: {:?}", e))
        .value;
    let mut program = TypeChecker::new(&profile)
        .check(&unit)
        .unwrap_or_else(|e| panic!("check failed: {:?}", e))
        .value;
    map_bindings(&mut program).unwrap_or_else(|e| panic!("link failed: {:?}", e));
    let entry = program.entry.expect("entry point");
    program.functions[entry.0 as usize].locals.clear();

    let d = generate(&program).expect_err("store through a missing local");
    assert_eq!(d.kind_name(), "CodeGenError");
    assert_eq!(d.message, "initializer for an unknown local variable");
}
